// Fee Schema API Contract Tests
//
// HTTP status codes and response shapes of the fee schema endpoints.

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::{http::StatusCode, test, App};
use serde_json::{json, Value};

use helpers::TestContext;

#[actix_web::test]
async fn test_create_and_list_schemas() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/merchants/M1/fee-schemas")
        .set_json(json!({ "entity": "GLASSBOX", "amount": "10.00", "description": "platform" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["id"].as_i64().unwrap() > 0);
    assert_eq!(body["merchant_id"], "M1");
    assert_eq!(body["entity"], "GLASSBOX");
    assert_eq!(body["amount"], "10.00");
    assert_eq!(body["is_active"], true);

    let req = test::TestRequest::post()
        .uri("/api/merchants/M1/fee-schemas")
        .set_json(json!({ "entity": "BROKER", "amount": "80" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/merchants/M1/fee-schemas?active_only=true")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_rejected_schemas_return_400() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let create = |body: Value| {
        test::TestRequest::post()
            .uri("/api/merchants/M1/fee-schemas")
            .set_json(body)
            .to_request()
    };

    let resp = test::call_service(&app, create(json!({ "entity": "BROKER", "amount": "90" }))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Over the cap
    let resp = test::call_service(&app, create(json!({ "entity": "SALES", "amount": "10.01" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], 400);
    assert!(body["error"]["message"].as_str().unwrap().contains("exceeding 100%"));

    // Duplicate active entity
    let resp = test::call_service(&app, create(json!({ "entity": "BROKER", "amount": "1" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Malformed percentages
    let resp = test::call_service(&app, create(json!({ "entity": "SALES", "amount": "-1" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = test::call_service(&app, create(json!({ "entity": "SALES", "amount": "1.005" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Unknown entity never reaches the service
    let resp = test::call_service(&app, create(json!({ "entity": "PLATFORM", "amount": "1" }))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_update_and_deactivate() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/merchants/M1/fee-schemas")
        .set_json(json!({ "entity": "BROKER", "amount": "80" }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/fee-schemas/{}", id))
        .set_json(json!({ "amount": "100" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["amount"], "100");

    let req = test::TestRequest::post()
        .uri(&format!("/api/fee-schemas/{}/deactivate", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["is_active"], false);

    let req = test::TestRequest::put()
        .uri("/api/fee-schemas/424242")
        .set_json(json!({ "amount": "1" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::put()
        .uri("/api/fee-schemas/not-a-number")
        .set_json(json!({ "amount": "1" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_preview_validation() {
    let ctx = TestContext::new();
    let app = test::init_service(App::new().configure(|cfg| ctx.state.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/merchants/M1/fee-schemas")
        .set_json(json!({ "entity": "GLASSBOX", "amount": "30" }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/merchants/M1/fee-schemas/validate")
        .set_json(json!({ "entity": "BROKER", "amount": "45.5" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["total_allocated"], "75.5");
    assert_eq!(body["remaining"], "24.5");

    // Editing the existing schema itself: excluded from the sibling sum
    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/merchants/M1/fee-schemas/validate?exclude_id={}",
            created["id"]
        ))
        .set_json(json!({ "entity": "GLASSBOX", "amount": "100" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // Nothing was written by the previews
    let req = test::TestRequest::get()
        .uri("/api/merchants/M1/fee-schemas")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}
