//! Bearer-token identity.
//!
//! Verifies [`IdentityToken`]s issued by the identity provider using
//! ed25519-dalek, and caches successful verifications until the token
//! expires to avoid re-checking signatures on every request.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use parley_shared::identity_token::{verify_identity_token, IdentityToken};
use parley_store::{StoreError, User};

use crate::api::AppState;
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Cached entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedIdentity {
    subject: String,
    expires_at: DateTime<Utc>,
}

impl CachedIdentity {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Verifies bearer tokens and caches the subject they carry.
#[derive(Clone)]
pub struct IdentityVerifier {
    issuer_pubkey: [u8; 32],
    /// Cache: encoded token -> verified subject.
    cache: Arc<RwLock<HashMap<String, CachedIdentity>>>,
}

impl IdentityVerifier {
    pub fn new(issuer_pubkey: [u8; 32]) -> Self {
        Self {
            issuer_pubkey,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the verified subject for an encoded token, or `None` when the
    /// token is malformed, expired or not signed by the issuer.
    pub async fn verify(&self, encoded: &str) -> Option<String> {
        let now = Utc::now();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(encoded) {
                if entry.is_fresh(now) {
                    return Some(entry.subject.clone());
                }
            }
        }

        let token = match IdentityToken::decode(encoded) {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "Rejected undecodable identity token");
                return None;
            }
        };

        match verify_identity_token(&token, &self.issuer_pubkey, now) {
            Ok(subject) => {
                let mut cache = self.cache.write().await;
                cache.insert(
                    encoded.to_string(),
                    CachedIdentity {
                        subject: subject.clone(),
                        expires_at: token.expires_at,
                    },
                );
                Some(subject)
            }
            Err(e) => {
                debug!(error = %e, "Identity verification failed");
                None
            }
        }
    }

    /// Evict expired entries from the cache.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.is_fresh(now));
        let removed = before - cache.len();
        if removed > 0 {
            debug!(removed, "Purged expired identity cache entries");
        }
    }
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// Verified subject of the request, if any. Never rejects: operations decide
/// for themselves whether a missing identity is an error.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<String>);

impl Identity {
    pub fn subject(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Identity(verified_subject(parts, state).await))
    }
}

/// A verified subject that may not have a profile yet. Rejects with
/// `Unauthenticated`.
#[derive(Debug, Clone)]
pub struct Subject(pub String);

impl FromRequestParts<AppState> for Subject {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let subject = verified_subject(parts, state)
            .await
            .ok_or(StoreError::Unauthenticated)?;
        Ok(Subject(subject))
    }
}

/// The resolved application user. Rejects with `Unauthenticated` or
/// `ProfileNotSynced`.
///
/// Handlers list it before any path or body extractor so that identity is
/// settled before the rest of the request is looked at.
#[derive(Debug, Clone)]
pub struct Caller(pub User);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let subject = verified_subject(parts, state).await;
        let db = state.db().await;
        Ok(Caller(db.resolve_caller(subject.as_deref())?))
    }
}

async fn verified_subject(parts: &Parts, state: &AppState) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())?;

    state.verifier.verify(bearer).await
}
