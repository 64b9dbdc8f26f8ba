pub mod revenue_aggregate;

pub use revenue_aggregate::{
    AggregateKey, Dimension, DimensionSpec, DimensionValue, RevenueAggregate, UNCATEGORIZED,
};
