pub mod aggregate_repository;

pub use aggregate_repository::{
    InMemoryAggregateRepository, MySqlAggregateRepository, RevenueAggregateRepository,
};
