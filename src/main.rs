use actix_cors::Cors;
use actix_web::{App, HttpServer};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use revshare::app::{AppState, Stores};
use revshare::config::Config;
use revshare::middleware::RequestId;
use revshare::settlements::repositories::InMemoryTransactionSource;

fn init_tracing(json: bool, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("revshare={},actix_web=info", level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    init_tracing(config.app.is_production(), &config.app.log_level);
    config.validate()?;

    tracing::info!("Starting revshare settlement engine");
    tracing::info!("Environment: {}", config.app.env);
    tracing::info!("Server binding to: {}", config.server.bind_address());

    let pool = config.database.create_pool().await?;
    let stores = match pool.as_ref() {
        Some(pool) => {
            if config.database.run_migrations {
                sqlx::migrate!("./migrations").run(pool).await?;
                tracing::info!("Database migrations applied");
            }
            tracing::info!(
                "Database pool initialized ({} connections)",
                config.database.pool_size
            );
            Stores::mysql(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            Stores::in_memory(std::sync::Arc::new(InMemoryTransactionSource::new()))
        }
    };

    let state = AppState::new(stores, config.settlement.clone(), pool);

    let recovered = state.generator.recover_abandoned().await?;
    if recovered > 0 {
        tracing::warn!(recovered, "Marked abandoned settlement batches as failed");
    }

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Cors::permissive())
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .workers(config.server.workers)
    .bind(&bind_address)?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await?;
    Ok(())
}
