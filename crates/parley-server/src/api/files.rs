use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use tracing::info;

use crate::api::AppState;
use crate::auth::Caller;
use crate::blob_store::UploadTicket;
use crate::error::ServerError;

/// Hand a user with a synced profile a one-shot URL to upload a file to.
pub(super) async fn generate_upload_url(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<UploadTicket>, ServerError> {
    let ticket = state.blob_store.issue_upload_ticket().await;
    info!(storage_ref = %ticket.storage_ref, user = %caller.id, "Upload URL issued");
    Ok(Json(ticket))
}

/// The ticket in the URL is the credential; no bearer token required.
pub(super) async fn upload_blob(
    State(state): State<AppState>,
    Path(storage_ref): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ServerError> {
    state.blob_store.store_upload(&storage_ref, &body).await?;
    Ok(StatusCode::CREATED)
}

pub(super) async fn download_blob(
    State(state): State<AppState>,
    Path(storage_ref): Path<String>,
) -> Result<Vec<u8>, ServerError> {
    state.blob_store.get_blob(&storage_ref).await
}
