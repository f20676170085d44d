use axum::{extract::State, http::StatusCode, Json};
use parley_shared::{ConversationId, MessageId};
use parley_store::{FileAttachment, MessageView, ReactionToggle, StoreError, ValidationError};
use serde::{Deserialize, Serialize};

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::AppState;
use crate::auth::Caller;
use crate::error::ServerError;

#[derive(Deserialize)]
pub(super) struct SendMessageRequest {
    body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MessageSent {
    message_id: MessageId,
}

#[derive(Deserialize)]
pub(super) struct ReactionRequest {
    emoji: String,
}

#[derive(Serialize)]
pub(super) struct ReactionResponse {
    reacted: bool,
}

/// Soft-fail read: an id that cannot name a conversation has no messages.
pub(super) async fn list_messages(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Vec<MessageView>>, ServerError> {
    let Ok(id) = id.parse::<ConversationId>() else {
        return Ok(Json(Vec::new()));
    };
    let db = state.db().await;
    let messages = db.list_messages(&caller, id, state.blob_store.as_ref())?;
    Ok(Json(messages))
}

pub(super) async fn send_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<Json<MessageSent>, ServerError> {
    let mut db = state.db().await;
    let message_id = db.send_message(&caller, id, &req.body)?;
    Ok(Json(MessageSent { message_id }))
}

/// Post a message for a file the client already uploaded.
pub(super) async fn send_file_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(file): ApiJson<FileAttachment>,
) -> Result<Json<MessageSent>, ServerError> {
    if !state.blob_store.contains(&file.storage_ref) {
        return Err(StoreError::from(ValidationError::MissingStorageRef).into());
    }

    let mut db = state.db().await;
    let message_id = db.send_file_message(&caller, id, file)?;
    Ok(Json(MessageSent { message_id }))
}

pub(super) async fn soft_delete_message(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<MessageId>,
) -> Result<StatusCode, ServerError> {
    let mut db = state.db().await;
    db.soft_delete_message(&caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn toggle_reaction(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<MessageId>,
    ApiJson(req): ApiJson<ReactionRequest>,
) -> Result<Json<ReactionResponse>, ServerError> {
    let mut db = state.db().await;
    let outcome = db.toggle_reaction(&caller, id, &req.emoji)?;
    Ok(Json(ReactionResponse {
        reacted: outcome == ReactionToggle::Added,
    }))
}
