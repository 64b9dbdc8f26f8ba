pub mod fee_schema_repository;

pub use fee_schema_repository::{
    FeeSchemaRepository, InMemoryFeeSchemaRepository, MySqlFeeSchemaRepository,
};
