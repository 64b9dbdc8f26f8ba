pub mod batch_repository;
pub mod transaction_source;

pub use batch_repository::{InMemoryBatchRepository, MySqlBatchRepository, SettlementBatchRepository};
pub use transaction_source::{InMemoryTransactionSource, MySqlTransactionSource, TransactionSource};
