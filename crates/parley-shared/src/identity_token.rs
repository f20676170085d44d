//! Identity token issued by the identity provider.
//!
//! The provider signs `subject || expires_at (rfc3339)` with its Ed25519 key.
//! Clients present the token as `Authorization: Bearer <token>` where
//! `<token>` is the URL-safe base64 encoding of the JSON-serialized struct.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityToken {
    /// Stable subject id assigned by the identity provider.
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    pub signature: Vec<u8>,
}

impl IdentityToken {
    /// Encode for transport in an `Authorization` header.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and bytes cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(encoded: &str) -> Result<Self, TokenError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| TokenError::Encoding)?;
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

fn signing_payload(subject: &str, expires_at: &DateTime<Utc>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(subject.len() + 32);
    payload.extend_from_slice(subject.as_bytes());
    payload.extend_from_slice(expires_at.to_rfc3339().as_bytes());
    payload
}

/// Verify a token against the issuer's public key at time `now`.
///
/// Returns the verified subject id.
pub fn verify_identity_token(
    token: &IdentityToken,
    issuer_pubkey: &[u8; 32],
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    if now >= token.expires_at {
        return Err(TokenError::Expired);
    }
    if token.subject.is_empty() {
        return Err(TokenError::Malformed("empty subject".into()));
    }

    let verifying_key =
        VerifyingKey::from_bytes(issuer_pubkey).map_err(|_| TokenError::InvalidIssuerKey)?;
    // The all-zero development key decodes to a small-order point.
    if verifying_key.is_weak() {
        return Err(TokenError::InvalidIssuerKey);
    }
    let signature =
        Signature::from_slice(&token.signature).map_err(|_| TokenError::BadSignature)?;

    verifying_key
        .verify_strict(&signing_payload(&token.subject, &token.expires_at), &signature)
        .map_err(|_| TokenError::BadSignature)?;

    Ok(token.subject.clone())
}

/// Issue a token. Used by the identity provider and by tests.
pub fn create_identity_token(
    subject: &str,
    expires_at: DateTime<Utc>,
    issuer_key: &SigningKey,
) -> IdentityToken {
    let signature = issuer_key.sign(&signing_payload(subject, &expires_at));

    IdentityToken {
        subject: subject.to_string(),
        expires_at,
        signature: signature.to_bytes().to_vec(),
    }
}
