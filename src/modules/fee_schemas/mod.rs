pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{FeeEntity, FeeSchema, SchemaSnapshot, SchemaViolation};
pub use repositories::{FeeSchemaRepository, InMemoryFeeSchemaRepository, MySqlFeeSchemaRepository};
pub use services::{FeeSchemaService, FeeSchemaValidator, ValidationOutcome};
