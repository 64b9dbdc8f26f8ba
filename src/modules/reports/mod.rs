pub mod controllers;
pub mod models;
pub mod services;

pub use models::SettlementReport;
pub use services::{ReportBuilder, ReportService};
