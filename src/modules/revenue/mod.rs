pub mod models;
pub mod repositories;
pub mod services;

pub use models::{Dimension, DimensionSpec, RevenueAggregate};
pub use repositories::RevenueAggregateRepository;
pub use services::RevenueAggregator;
