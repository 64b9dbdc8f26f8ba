//! Revenue share engine
//!
//! Fee schema management, per-transaction fee allocation, monthly revenue
//! aggregation and settlement batch generation for an advertising platform.

pub mod app;
pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::allocations;
pub use modules::fee_schemas;
pub use modules::reports;
pub use modules::revenue;
pub use modules::settlements;
