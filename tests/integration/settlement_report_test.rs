// Settlement Report Integration Tests
//
// Reports are read back from stored batches and aggregates after a real
// generation run.

#[path = "../helpers/mod.rs"]
mod helpers;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use helpers::{before_march_2024, march_2024, seed_standard_schemas, seed_schema, TestContext, TestDataFactory};
use revshare::config::SettlementConfig;
use revshare::core::{AppError, Currency};
use revshare::fee_schemas::FeeEntity;
use revshare::revenue::models::UNCATEGORIZED;
use revshare::settlements::SettlementBatch;
use revshare::settlements::repositories::SettlementBatchRepository;

async fn seeded_context() -> TestContext {
    let ctx = TestContext::new();
    seed_standard_schemas(ctx.schemas.as_ref(), "M1", before_march_2024()).await;
    seed_schema(ctx.schemas.as_ref(), "M2", FeeEntity::Glassbox, dec!(20), before_march_2024()).await;
    seed_schema(ctx.schemas.as_ref(), "M2", FeeEntity::Merchant, dec!(80), before_march_2024()).await;

    let period = march_2024();
    let records = vec![
        TestDataFactory::tagged(
            TestDataFactory::view_record("tx-1", Some("M1"), dec!(100.00), Currency::USD, period, 1),
            Some("P1"),
            Some("food"),
            None,
        ),
        TestDataFactory::tagged(
            TestDataFactory::view_record("tx-2", Some("M1"), dec!(20.00), Currency::USD, period, 2),
            Some("P1"),
            Some("food"),
            None,
        ),
        TestDataFactory::view_record("tx-3", Some("M2"), dec!(30.00), Currency::USD, period, 3),
        TestDataFactory::view_record("tx-4", Some("M2"), dec!(250000), Currency::IDR, period, 4),
    ];
    ctx.source.extend(records).await;
    ctx
}

#[tokio::test]
async fn test_report_reconciles_with_the_batch() {
    let ctx = seeded_context().await;
    let batch = ctx.state.generator.generate(march_2024(), false).await.unwrap();

    let report = ctx.state.reports.report_for_batch(batch.id).await.unwrap();

    assert_eq!(report.batch_id, batch.id);
    assert_eq!(report.status, "completed");
    assert!(!report.is_partial);
    assert_eq!(report.total(Currency::USD), dec!(150.00));
    assert_eq!(report.total(Currency::IDR), dec!(250000));

    // Entity breakdown sums to the gross, per currency
    for currency in [Currency::USD, Currency::IDR] {
        let entities: Decimal = report
            .entities
            .iter()
            .filter(|e| e.currency == currency)
            .map(|e| e.amount)
            .sum();
        assert_eq!(entities, report.total(currency));
    }

    assert_eq!(report.entity_amount("GLASSBOX", Currency::USD), dec!(18.00));
    assert_eq!(report.entity_amount("BROKER", Currency::USD), dec!(96.00));
    assert_eq!(report.entity_amount("MERCHANT", Currency::USD), dec!(24.00));
    assert_eq!(report.entity_amount("UNASSIGNED", Currency::USD), dec!(6.00));
    assert_eq!(report.entity_amount("GLASSBOX", Currency::IDR), dec!(50000));

    let m1 = report.merchant("M1", Currency::USD).unwrap();
    assert_eq!(m1.gross, dec!(120.00));
    assert_eq!(m1.fees, dec!(114.00));
    assert_eq!(m1.net, dec!(6.00));
    assert_eq!(m1.record_count, 2);

    // The merchant's own share is not a fee
    let m2 = report.merchant("M2", Currency::USD).unwrap();
    assert_eq!(m2.fees, dec!(6.00));
    assert_eq!(m2.net, dec!(24.00));

    let food = report.category("food", Currency::USD).unwrap();
    assert_eq!(food.amount, dec!(120.00));
    assert_eq!(food.percentage, dec!(80.00));
    let untagged = report.category(UNCATEGORIZED, Currency::IDR).unwrap();
    assert_eq!(untagged.percentage, dec!(100));
}

#[tokio::test]
async fn test_latest_report_follows_regeneration() {
    let ctx = seeded_context().await;
    let first = ctx.state.generator.generate(march_2024(), false).await.unwrap();
    let second = ctx.state.generator.generate(march_2024(), true).await.unwrap();

    let latest = ctx.state.reports.latest_report(march_2024()).await.unwrap();
    assert_eq!(latest.batch_id, second.id);

    // Superseded batches stay reportable
    let original = ctx.state.reports.report_for_batch(first.id).await.unwrap();
    assert_eq!(original.totals, latest.totals);
}

#[tokio::test]
async fn test_partial_batch_report_is_flagged() {
    let ctx = TestContext::with_config(SettlementConfig {
        max_failure_ratio: dec!(0.5),
        ..SettlementConfig::default()
    });
    seed_standard_schemas(ctx.schemas.as_ref(), "M1", before_march_2024()).await;
    ctx.source
        .extend(TestDataFactory::usd_records("M1", 9, dec!(1.00), march_2024()))
        .await;
    ctx.source
        .push(TestDataFactory::view_record("orphan", None, dec!(1.00), Currency::USD, march_2024(), 42))
        .await;

    let batch = ctx.state.generator.generate(march_2024(), false).await.unwrap();
    let report = ctx.state.reports.report_for_batch(batch.id).await.unwrap();

    assert!(report.is_partial);
    assert_eq!(report.status, "completed_with_errors");
    assert_eq!(report.failed_records, 1);
    assert_eq!(report.total(Currency::USD), dec!(9.00));
}

#[tokio::test]
async fn test_only_completed_batches_are_reportable() {
    let ctx = TestContext::new();

    let pending = ctx
        .batches
        .create(SettlementBatch::new(march_2024(), 1, false))
        .await
        .unwrap();

    let err = ctx.state.reports.report_for_batch(pending.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = ctx.state.reports.latest_report(march_2024()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = ctx.state.reports.report_for_batch(9999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
