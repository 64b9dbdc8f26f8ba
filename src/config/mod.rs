use crate::core::{AppError, Result};
use std::env;

pub mod database;
pub mod server;
pub mod settlement;

pub use database::DatabaseConfig;
pub use server::ServerConfig;
pub use settlement::SettlementConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub settlement: SettlementConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            settlement: SettlementConfig::from_env()?,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            return Err(AppError::Configuration(
                "Server workers must be greater than 0".to_string(),
            ));
        }

        if self.app.is_production() && self.database.url.is_none() {
            return Err(AppError::Configuration(
                "DATABASE_URL is required in production".to_string(),
            ));
        }

        self.database.validate()?;
        self.settlement.validate()
    }
}
