pub mod fee_schema;
pub mod schema_violation;

pub use fee_schema::{
    CreateFeeSchemaRequest, FeeEntity, FeeSchema, FeeSchemaRevision, SchemaSnapshot,
    UpdateFeeSchemaRequest,
};
pub use schema_violation::SchemaViolation;
