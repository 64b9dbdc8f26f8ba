pub mod revenue_aggregator;

pub use revenue_aggregator::RevenueAggregator;
