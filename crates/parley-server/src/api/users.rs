use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use parley_shared::UserId;
use parley_store::{AuthState, ProfileSync, StoreError, UserView};
use serde::{Deserialize, Serialize};

use crate::api::extract::ApiJson;
use crate::api::AppState;
use crate::auth::{Caller, Identity, Subject};
use crate::error::ServerError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SyncResponse {
    user_id: UserId,
}

#[derive(Deserialize)]
pub(super) struct SearchParams {
    q: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PresenceRequest {
    is_online: bool,
}

pub(super) async fn auth_state(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<AuthState>, ServerError> {
    let db = state.db().await;
    Ok(Json(db.auth_state(identity.subject())?))
}

/// Create or refresh the caller's profile. The body may only describe the
/// verified subject.
pub(super) async fn sync_current_user(
    State(state): State<AppState>,
    Subject(subject): Subject,
    ApiJson(profile): ApiJson<ProfileSync>,
) -> Result<Json<SyncResponse>, ServerError> {
    if profile.subject != subject {
        tracing::warn!(verified = %subject, claimed = %profile.subject, "Sync for foreign subject");
        return Err(StoreError::Unauthenticated.into());
    }

    let mut db = state.db().await;
    let user_id = db.sync_user(&profile)?;
    Ok(Json(SyncResponse { user_id }))
}

pub(super) async fn current_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<UserView>, ServerError> {
    let db = state.db().await;
    Ok(Json(db.current_user(&caller)?))
}

pub(super) async fn search_users(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserView>>, ServerError> {
    let db = state.db().await;
    Ok(Json(db.search_users(&caller, params.q.as_deref())?))
}

pub(super) async fn set_online_status(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<PresenceRequest>,
) -> Result<StatusCode, ServerError> {
    let mut db = state.db().await;
    db.set_online_status(&caller, req.is_online)?;
    Ok(StatusCode::NO_CONTENT)
}
