use crate::core::{AppError, Result};
use serde::Deserialize;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Unset means the service runs on process-local stores
    pub url: Option<String>,
    pub pool_size: u32,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            pool_size: env::var("DATABASE_POOL_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| AppError::Configuration("Invalid DATABASE_POOL_SIZE".to_string()))?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| {
                    AppError::Configuration("Invalid DATABASE_MAX_CONNECTIONS".to_string())
                })?,
            run_migrations: env::var("RUN_MIGRATIONS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(true),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 || self.pool_size > self.max_connections {
            return Err(AppError::Configuration(
                "DATABASE_POOL_SIZE must not exceed DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a MySQL connection pool, or `None` when no database is configured
    pub async fn create_pool(&self) -> Result<Option<MySqlPool>> {
        let Some(url) = self.url.as_deref() else {
            return Ok(None);
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.pool_size)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600)) // 10 minutes
            .max_lifetime(Duration::from_secs(1800)) // 30 minutes
            .test_before_acquire(true)
            .connect(url)
            .await
            .map_err(AppError::Database)?;

        Ok(Some(pool))
    }
}
