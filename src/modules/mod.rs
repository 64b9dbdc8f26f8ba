pub mod allocations;
pub mod fee_schemas;
pub mod health;
pub mod reports;
pub mod revenue;
pub mod settlements;
