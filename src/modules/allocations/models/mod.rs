pub mod allocation;
pub mod view_record;

pub use allocation::{AllocationResult, Beneficiary, RemainderPolicy, TransactionAllocation};
pub use view_record::ViewRecord;
