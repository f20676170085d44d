use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_server::api::{self, AppState};
use parley_server::auth::IdentityVerifier;
use parley_server::blob_store::BlobStore;
use parley_server::config::ServerConfig;
use parley_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,parley_server=debug,parley_store=debug")
            }),
        )
        .init();

    info!("Starting Parley server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.identity_issuer_pubkey == [0u8; 32] {
        tracing::warn!("IDENTITY_ISSUER_PUBKEY not set; every request is unauthenticated");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    }
    .with_presence_stale_after(config.presence_stale_after);

    let blob_store = BlobStore::new(
        config.blob_storage_path.clone(),
        config.max_blob_size,
        config.public_base_url.clone(),
        config.upload_ticket_ttl,
    )
    .await?;

    let verifier = IdentityVerifier::new(config.identity_issuer_pubkey);

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, blob_store, verifier, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic identity cache cleanup (every 10 minutes)
    let verifier = Arc::clone(&app_state.verifier);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            verifier.purge_expired().await;
        }
    });

    // Periodic upload ticket cleanup (every minute)
    let blob_store = Arc::clone(&app_state.blob_store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            blob_store.purge_expired_tickets().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
