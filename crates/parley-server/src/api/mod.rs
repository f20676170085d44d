//! HTTP API.
//!
//! Handlers take the caller (resolved from the bearer identity) before any
//! path or body extractor, then take the database lock once and run one
//! store operation under it. Extractor rejections are reported through
//! [`ServerError`](crate::error::ServerError) like every other failure.

mod conversations;
mod extract;
mod files;
mod messages;
mod users;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{delete, get, post},
    Json, Router,
};
use parley_store::Database;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::IdentityVerifier;
use crate::blob_store::BlobStore;
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub blob_store: Arc<BlobStore>,
    pub verifier: Arc<IdentityVerifier>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        db: Database,
        blob_store: BlobStore,
        verifier: IdentityVerifier,
        config: ServerConfig,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            blob_store: Arc::new(blob_store),
            verifier: Arc::new(verifier),
            config: Arc::new(config),
        }
    }

    /// Exclusive access to the store for one unit of work.
    pub(crate) async fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.config.max_blob_size;

    Router::new()
        .route("/health", get(health_check))
        // Users and presence
        .route("/auth/state", get(users::auth_state))
        .route("/users/sync", post(users::sync_current_user))
        .route("/users/me", get(users::current_user))
        .route("/users/search", get(users::search_users))
        .route("/presence", post(users::set_online_status))
        // Conversations
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/direct", post(conversations::start_direct))
        .route("/conversations/group", post(conversations::create_group))
        .route("/conversations/{id}", get(conversations::get_conversation))
        .route("/conversations/{id}/read", post(conversations::mark_read))
        .route(
            "/conversations/{id}/typing",
            get(conversations::typing_users).post(conversations::set_typing),
        )
        // Messages
        .route(
            "/conversations/{id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/conversations/{id}/files", post(messages::send_file_message))
        .route("/messages/{id}", delete(messages::soft_delete_message))
        .route("/messages/{id}/reactions", post(messages::toggle_reaction))
        // Object storage
        .route("/files/upload-url", post(files::generate_upload_url))
        .route("/blob/upload/{storage_ref}", post(files::upload_blob))
        .route("/blob/{storage_ref}", get(files::download_blob))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
