use axum::{extract::State, http::StatusCode, Json};
use parley_shared::{ConversationId, UserId};
use parley_store::{ConversationListItem, ConversationView, StoreError};
use serde::{Deserialize, Serialize};

use crate::api::extract::{ApiJson, ApiPath};
use crate::api::AppState;
use crate::auth::Caller;
use crate::error::ServerError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StartDirectRequest {
    other_user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateGroupRequest {
    title: String,
    member_ids: Vec<UserId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConversationCreated {
    conversation_id: ConversationId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TypingRequest {
    is_typing: bool,
}

pub(super) async fn start_direct(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<StartDirectRequest>,
) -> Result<Json<ConversationCreated>, ServerError> {
    let mut db = state.db().await;
    let conversation_id = db.start_or_create_direct(&caller, req.other_user_id)?;
    Ok(Json(ConversationCreated { conversation_id }))
}

pub(super) async fn create_group(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<CreateGroupRequest>,
) -> Result<Json<ConversationCreated>, ServerError> {
    let mut db = state.db().await;
    let conversation_id = db.create_group(&caller, &req.title, &req.member_ids)?;
    Ok(Json(ConversationCreated { conversation_id }))
}

pub(super) async fn list_conversations(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<Vec<ConversationListItem>>, ServerError> {
    let db = state.db().await;
    Ok(Json(db.list_conversations(&caller)?))
}

pub(super) async fn get_conversation(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<Json<ConversationView>, ServerError> {
    let db = state.db().await;
    let view = db
        .get_conversation(&caller, id)?
        .ok_or(StoreError::ConversationNotFound)?;
    Ok(Json(view))
}

pub(super) async fn mark_read(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<StatusCode, ServerError> {
    let mut db = state.db().await;
    db.mark_conversation_read(&caller, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn set_typing(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(req): ApiJson<TypingRequest>,
) -> Result<StatusCode, ServerError> {
    let mut db = state.db().await;
    db.set_typing(&caller, id, req.is_typing)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Soft-fail read: an id that cannot name a conversation has no typists.
pub(super) async fn typing_users(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiPath(id): ApiPath<String>,
) -> Result<Json<Vec<String>>, ServerError> {
    let Ok(id) = id.parse::<ConversationId>() else {
        return Ok(Json(Vec::new()));
    };
    let db = state.db().await;
    Ok(Json(db.typing_users(&caller, id)?))
}
