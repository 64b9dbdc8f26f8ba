pub mod models;
pub mod services;

pub use models::{AllocationResult, Beneficiary, RemainderPolicy, TransactionAllocation, ViewRecord};
pub use services::AllocationCalculator;
