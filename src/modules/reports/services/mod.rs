pub mod report_builder;
pub mod report_service;

pub use report_builder::ReportBuilder;
pub use report_service::ReportService;
