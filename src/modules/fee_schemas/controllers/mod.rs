pub mod fee_schema_controller;

pub use fee_schema_controller::configure;
