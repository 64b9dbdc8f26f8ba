pub mod fee_schema_service;
pub mod schema_validator;

pub use fee_schema_service::FeeSchemaService;
pub use schema_validator::{FeeSchemaValidator, ValidationOutcome};
