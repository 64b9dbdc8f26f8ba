// Aggregation properties
//
// - aggregate(allocate(records)) is idempotent
// - Merging partials is associative and commutative
// - Currencies are never mixed
// - Aggregate totals equal the sum of allocated shares

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use revshare::allocations::{AllocationCalculator, AllocationResult, ViewRecord};
use revshare::core::Currency;
use revshare::fee_schemas::{FeeEntity, FeeSchema};
use revshare::revenue::models::UNCATEGORIZED;
use revshare::revenue::{Dimension, DimensionSpec, RevenueAggregator};

fn schemas() -> Vec<FeeSchema> {
    let mut out = Vec::new();
    for (i, (merchant, entity, pct)) in [
        ("M1", FeeEntity::Glassbox, dec!(10)),
        ("M1", FeeEntity::Sales, dec!(5)),
        ("M1", FeeEntity::Broker, dec!(80)),
        ("M2", FeeEntity::Glassbox, dec!(20)),
        ("M2", FeeEntity::Merchant, dec!(80)),
    ]
    .into_iter()
    .enumerate()
    {
        let mut schema = FeeSchema::new(merchant, entity, pct, None).unwrap();
        schema.id = i as i64 + 1;
        out.push(schema);
    }
    out
}

fn record(n: usize, merchant: &str, cents: i64, currency: Currency, category: Option<&str>) -> ViewRecord {
    let amount = match currency {
        Currency::IDR => Decimal::new(cents, 0),
        _ => Decimal::new(cents, 2),
    };
    ViewRecord {
        id: format!("tx-{}", n),
        merchant_id: Some(merchant.to_string()),
        partner_id: Some(format!("P{}", n % 3)),
        advertisement_id: None,
        device_id: None,
        category: category.map(str::to_string),
        amount,
        currency,
        displayed_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(n as i64),
    }
}

fn allocate_all(records: &[ViewRecord]) -> Vec<AllocationResult> {
    let calc = AllocationCalculator::default();
    let schemas = schemas();
    records
        .iter()
        .flat_map(|r| calc.allocate(r, &schemas).unwrap().shares)
        .collect()
}

#[test]
fn test_entity_totals_follow_allocations() {
    let records = vec![
        record(1, "M1", 10_000, Currency::USD, Some("food")),
        record(2, "M1", 2_000, Currency::USD, None),
        record(3, "M2", 5_000, Currency::USD, Some("food")),
    ];
    let results = allocate_all(&records);
    let aggregates = RevenueAggregator::new().aggregate(&results, &DimensionSpec::new([Dimension::Entity]));

    let amount = |label: &str| {
        aggregates
            .iter()
            .find(|a| a.value_of(Dimension::Entity) == Some(label))
            .map(|a| a.total_amount)
            .unwrap_or_default()
    };
    // M1: 100.00 and 20.00 at 10/5/80; M2: 50.00 at 20/80 merchant
    assert_eq!(amount("GLASSBOX"), dec!(22.00));
    assert_eq!(amount("SALES"), dec!(6.00));
    assert_eq!(amount("BROKER"), dec!(96.00));
    assert_eq!(amount("MERCHANT"), dec!(40.00));
    assert_eq!(amount("UNASSIGNED"), dec!(6.00));
}

#[test]
fn test_category_buckets_include_uncategorized() {
    let records = vec![
        record(1, "M1", 10_000, Currency::USD, Some("food")),
        record(2, "M1", 2_000, Currency::USD, Some("  ")),
        record(3, "M1", 1_000, Currency::USD, None),
    ];
    let results = allocate_all(&records);
    let aggregates = RevenueAggregator::new().aggregate(&results, &DimensionSpec::new([Dimension::Category]));

    assert_eq!(aggregates.len(), 2);
    let untagged = aggregates
        .iter()
        .find(|a| a.value_of(Dimension::Category) == Some(UNCATEGORIZED))
        .unwrap();
    assert_eq!(untagged.total_amount, dec!(30.00));
    assert_eq!(untagged.record_count, 2);
}

#[test]
fn test_currencies_stay_separate() {
    let records = vec![
        record(1, "M1", 10_000, Currency::USD, None),
        record(2, "M1", 150_000, Currency::IDR, None),
        record(3, "M1", 10_000, Currency::MYR, None),
    ];
    let results = allocate_all(&records);
    let aggregator = RevenueAggregator::new();
    let totals = aggregator.totals_by_currency(&aggregator.aggregate(&results, &DimensionSpec::total()));

    assert_eq!(totals.len(), 3);
    assert_eq!(totals[&Currency::USD], dec!(100.00));
    assert_eq!(totals[&Currency::IDR], dec!(150000));
    assert_eq!(totals[&Currency::MYR], dec!(100.00));
}

fn records_strategy() -> impl Strategy<Value = Vec<ViewRecord>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["M1", "M2"]),
            1i64..5_000_000i64,
            prop::sample::select(vec![Currency::USD, Currency::IDR, Currency::MYR]),
            prop::option::of(prop::sample::select(vec!["food", "travel"])),
        ),
        0..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(n, (merchant, cents, currency, category))| record(n, merchant, cents, currency, category))
            .collect()
    })
}

fn spec_strategy() -> impl Strategy<Value = DimensionSpec> {
    prop::sample::subsequence(
        vec![
            Dimension::Partner,
            Dimension::Merchant,
            Dimension::Category,
            Dimension::Entity,
        ],
        0..=4,
    )
    .prop_map(DimensionSpec::new)
}

proptest! {
    #[test]
    fn test_aggregation_is_idempotent(records in records_strategy(), spec in spec_strategy()) {
        let aggregator = RevenueAggregator::new();
        let first = aggregator.aggregate(&allocate_all(&records), &spec);
        let second = aggregator.aggregate(&allocate_all(&records), &spec);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_merge_is_associative_and_commutative(
        records in records_strategy(),
        spec in spec_strategy(),
        split_a in 0usize..40,
        split_b in 0usize..40,
    ) {
        let aggregator = RevenueAggregator::new();
        let results = allocate_all(&records);
        let full = aggregator.aggregate(&results, &spec);

        // Split on transaction boundaries so partials cover disjoint record sets
        let tx_cut = |n: usize| {
            let id = format!("tx-{}", n.min(records.len()));
            results.iter().position(|r| r.transaction_id == id).unwrap_or(results.len())
        };
        let (lo, hi) = {
            let (a, b) = (tx_cut(split_a), tx_cut(split_b));
            (a.min(b), a.max(b))
        };
        let a = aggregator.aggregate(&results[..lo], &spec);
        let b = aggregator.aggregate(&results[lo..hi], &spec);
        let c = aggregator.aggregate(&results[hi..], &spec);

        let left = aggregator.merge(aggregator.merge(a.clone().into_iter().chain(b.clone())).into_iter().chain(c.clone()));
        let right = aggregator.merge(a.clone().into_iter().chain(aggregator.merge(b.clone().into_iter().chain(c.clone()))));
        let shuffled = aggregator.merge(c.into_iter().chain(a).chain(b));

        prop_assert_eq!(&left, &full);
        prop_assert_eq!(&right, &full);
        prop_assert_eq!(&shuffled, &full);
    }

    #[test]
    fn test_totals_match_shares_per_currency(records in records_strategy()) {
        let aggregator = RevenueAggregator::new();
        let results = allocate_all(&records);
        let totals = aggregator.totals_by_currency(&aggregator.aggregate(&results, &DimensionSpec::total()));

        for currency in [Currency::USD, Currency::IDR, Currency::MYR] {
            let gross: Decimal = records.iter().filter(|r| r.currency == currency).map(|r| r.amount).sum();
            prop_assert_eq!(totals.get(&currency).copied().unwrap_or_default(), gross);
        }
    }
}
