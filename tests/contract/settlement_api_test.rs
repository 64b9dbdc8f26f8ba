// Settlement and Report API Contract Tests
//
// Generation is asynchronous over HTTP: the generate endpoint answers 202
// with a pending batch and clients poll the progress endpoint.

#[path = "../helpers/mod.rs"]
mod helpers;

use std::time::Duration;

use actix_web::{http::StatusCode, test, App};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use helpers::{before_march_2024, march_2024, seed_standard_schemas, TestContext, TestDataFactory};
use revshare::core::{Currency, Period};
use revshare::settlements::repositories::SettlementBatchRepository;
use revshare::settlements::SettlementBatch;

const TERMINAL: [&str; 4] = ["completed", "completed_with_errors", "failed", "failed_partial"];

/// Poll the progress endpoint until the batch reaches a terminal state
macro_rules! wait_for_batch {
    ($app:expr, $id:expr) => {{
        let mut finished = None;
        for _ in 0..200 {
            let req = test::TestRequest::get()
                .uri(&format!("/api/settlements/batches/{}/progress", $id))
                .to_request();
            let progress: Value = test::call_and_read_body_json($app, req).await;
            if TERMINAL.contains(&progress["display_status"].as_str().unwrap_or_default()) {
                finished = Some(progress);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        finished.unwrap_or_else(|| panic!("batch {} did not finish", $id))
    }};
}

fn amount(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn seeded_context() -> TestContext {
    let ctx = TestContext::new();
    seed_standard_schemas(ctx.schemas.as_ref(), "M1", before_march_2024()).await;

    let mut records = TestDataFactory::usd_records("M1", 99, dec!(2.00), march_2024());
    records.push(TestDataFactory::view_record(
        "orphan",
        None,
        dec!(2.00),
        Currency::USD,
        march_2024(),
        500,
    ));
    ctx.source.extend(records).await;
    ctx
}

#[actix_web::test]
async fn test_generate_poll_and_report() {
    let ctx = seeded_context().await;
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/settlements/2024-03/generate")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let scheduled: Value = test::read_body_json(resp).await;
    assert_eq!(scheduled["period"], "2024-03");
    assert_eq!(scheduled["attempt"], 1);
    let id = scheduled["id"].as_i64().unwrap();

    let progress = wait_for_batch!(&app, id);
    assert_eq!(progress["display_status"], "completed_with_errors");
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["processed_records"], 99);
    assert_eq!(progress["failed_records"], 1);
    assert_eq!(amount(&progress["percent_complete"]), dec!(100));

    let req = test::TestRequest::get()
        .uri(&format!("/api/settlements/batches/{}", id))
        .to_request();
    let batch: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(amount(&batch["gross_totals"]["USD"]), dec!(198));
    assert_eq!(batch["failures"][0]["record_id"], "orphan");

    let req = test::TestRequest::get()
        .uri(&format!("/api/reports/settlements/{}", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = test::read_body_json(resp).await;
    assert_eq!(report["is_partial"], true);
    assert_eq!(report["totals"][0]["currency"], "USD");
    assert_eq!(amount(&report["totals"][0]["amount"]), dec!(198));
    let broker = report["entities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["entity"] == "BROKER")
        .unwrap();
    assert_eq!(amount(&broker["amount"]), dec!(158.40));
    assert_eq!(broker["record_count"], 99);

    let req = test::TestRequest::get()
        .uri("/api/reports/settlements/period/2024-03")
        .to_request();
    let latest: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(latest["batch_id"], id);
}

#[actix_web::test]
async fn test_generate_is_idempotent_unless_forced() {
    let ctx = seeded_context().await;
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/settlements/2024-03/generate")
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    let first_id = first["id"].as_i64().unwrap();
    wait_for_batch!(&app, first_id);

    let req = test::TestRequest::post()
        .uri("/api/settlements/2024-03/generate")
        .set_json(json!({ "force_regenerate": false }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let again: Value = test::read_body_json(resp).await;
    assert_eq!(again["id"], first_id);

    let req = test::TestRequest::post()
        .uri("/api/settlements/2024-03/generate")
        .set_json(json!({ "force_regenerate": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let forced: Value = test::read_body_json(resp).await;
    let forced_id = forced["id"].as_i64().unwrap();
    assert_ne!(forced_id, first_id);
    assert_eq!(forced["force_regenerated"], true);
    wait_for_batch!(&app, forced_id);

    let req = test::TestRequest::get()
        .uri("/api/settlements/2024-03/batches")
        .to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    let attempts: Vec<i64> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["attempt"].as_i64().unwrap())
        .collect();
    assert_eq!(attempts, vec![1, 2]);
}

#[actix_web::test]
async fn test_in_progress_period_returns_409() {
    let ctx = TestContext::new();
    let may = Period::new(2024, 5).unwrap();
    let running = ctx.batches.create(SettlementBatch::new(may, 1, false)).await.unwrap();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/settlements/2024-05/generate")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], 409);

    // Unfinished batches have no report
    let req = test::TestRequest::get()
        .uri(&format!("/api/reports/settlements/{}", running.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri("/api/reports/settlements/period/2024-05")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_bad_input_and_unknown_batches() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    for uri in ["/api/settlements/2024-13/generate", "/api/settlements/march/generate"] {
        let req = test::TestRequest::post().uri(uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::get()
        .uri("/api/reports/settlements/period/24-3x")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    for uri in [
        "/api/settlements/batches/777",
        "/api/settlements/batches/777/progress",
        "/api/reports/settlements/777",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}

#[actix_web::test]
async fn test_schemas_created_over_http_drive_the_current_period() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    for (entity, amount) in [("GLASSBOX", "20"), ("MERCHANT", "80")] {
        let req = test::TestRequest::post()
            .uri("/api/merchants/M7/fee-schemas")
            .set_json(json!({ "entity": entity, "amount": amount }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let current = Period::containing(Utc::now());
    ctx.source
        .extend(TestDataFactory::usd_records("M7", 10, dec!(5.00), current))
        .await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/settlements/{}/generate", current))
        .to_request();
    let scheduled: Value = test::call_and_read_body_json(&app, req).await;
    let id = scheduled["id"].as_i64().unwrap();
    let progress = wait_for_batch!(&app, id);
    assert_eq!(progress["display_status"], "completed");

    let req = test::TestRequest::get()
        .uri(&format!("/api/reports/settlements/period/{}", current))
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    let merchant = &report["merchants"][0];
    assert_eq!(merchant["merchant_id"], "M7");
    assert_eq!(amount(&merchant["gross"]), dec!(50));
    assert_eq!(amount(&merchant["fees"]), dec!(10));
    assert_eq!(amount(&merchant["net"]), dec!(40));
}

#[actix_web::test]
async fn test_health_probes() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");

    let req = test::TestRequest::get().uri("/ready").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}
