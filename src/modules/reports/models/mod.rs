pub mod settlement_report;

pub use settlement_report::{CategoryBreakdown, EntityBreakdown, MerchantSummary, SettlementReport};
