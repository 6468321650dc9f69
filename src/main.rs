use anyhow::Context;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use quantity_discounts::config::AppConfig;
use quantity_discounts::db;
use quantity_discounts::discounts::cache::{DiscountCache, MemoryDiscountCache, RedisDiscountCache};
use quantity_discounts::discounts::store::PgRuleStore;
use quantity_discounts::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,quantity_discounts=debug")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Quantity Discounts API - Starting...");

    let config = AppConfig::from_env().context("Invalid configuration")?;

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to create database pool")?;

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Migrations completed successfully");

    let cache: Arc<dyn DiscountCache> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisDiscountCache::connect(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set, using an in-process discount cache");
            Arc::new(MemoryDiscountCache::new())
        }
    };

    let state = AppState::new(
        Arc::new(PgRuleStore::new(db_pool.clone())),
        cache,
        config.cache_ttl,
        config.store_timeout,
    );
    let metrics = state.metrics.clone();

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Quantity Discounts API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    metrics.log_summary();
    db_pool.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
