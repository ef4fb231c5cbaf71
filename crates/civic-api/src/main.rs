//! # civic-api: Binary Entry Point
//!
//! Reads configuration from the environment, brings up storage and the
//! encryption service, and serves on `PORT` (default 8080).

use civic_api::state::{AppConfig, AppState, RecordStore};
use civic_fields::EncryptionService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();

    let records = match &config.database_url {
        Some(url) => {
            let pool = civic_api::db::init_pool(url).await.map_err(|e| {
                tracing::error!("Database initialization failed: {e}");
                e
            })?;
            RecordStore::sqlite(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records are kept in memory only");
            RecordStore::memory()
        }
    };

    let encryption = EncryptionService::from_env().map_err(|e| {
        tracing::error!("Encryption configuration invalid: {e}");
        e
    })?;

    // An unreachable HSM at boot is not fatal: reads fall back to
    // placeholders and writes fail until it recovers.
    if let Err(e) = encryption.initialize().await {
        if e.is_fatal() {
            tracing::error!("Encryption configuration unusable: {e}");
            return Err(e.into());
        }
        tracing::error!("Encryption self-test failed: {e}");
    }

    let port = config.port;
    let app = civic_api::app(AppState::new(encryption, records));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("civic-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
