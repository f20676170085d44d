//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;
use parley_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_PRESENCE_STALE_SECS, MAX_FILE_SIZE};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None` (platform data directory, `parley.db`).
    pub database_path: Option<PathBuf>,

    /// Directory holding uploaded file objects.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./blobs`
    pub blob_storage_path: PathBuf,

    /// Maximum object size in bytes.
    /// Env: `MAX_BLOB_SIZE`
    /// Default: 50 MiB
    pub max_blob_size: usize,

    /// Externally visible base URL used for upload and read URLs.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Ed25519 public key of the identity provider (hex-encoded, 64 chars).
    /// Env: `IDENTITY_ISSUER_PUBKEY`
    /// Default: all-zeros, which rejects every token.
    pub identity_issuer_pubkey: [u8; 32],

    /// How long an upload ticket stays usable.
    /// Env: `UPLOAD_TICKET_TTL_SECS`
    /// Default: 300
    pub upload_ticket_ttl: Duration,

    /// Online presence older than this reads as offline.
    /// Env: `PRESENCE_STALE_SECS` (0 disables)
    /// Default: 60
    pub presence_stale_after: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            blob_storage_path: PathBuf::from("./blobs"),
            max_blob_size: MAX_FILE_SIZE,
            public_base_url: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            identity_issuer_pubkey: [0u8; 32],
            upload_ticket_ttl: Duration::seconds(300),
            presence_stale_after: Some(Duration::seconds(DEFAULT_PRESENCE_STALE_SECS as i64)),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Some(val) = lookup("MAX_BLOB_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_blob_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BLOB_SIZE, using default"),
            }
        }

        if let Some(url) = lookup("PUBLIC_BASE_URL").filter(|u| !u.is_empty()) {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(hex_key) = lookup("IDENTITY_ISSUER_PUBKEY") {
            match parse_hex_pubkey(&hex_key) {
                Ok(key) => config.identity_issuer_pubkey = key,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid IDENTITY_ISSUER_PUBKEY, using default (rejects all tokens)"
                    );
                }
            }
        }

        if let Some(val) = lookup("UPLOAD_TICKET_TTL_SECS") {
            match val.parse::<i64>() {
                Ok(secs) if secs > 0 => config.upload_ticket_ttl = Duration::seconds(secs),
                _ => tracing::warn!(value = %val, "Invalid UPLOAD_TICKET_TTL_SECS, using default"),
            }
        }

        if let Some(val) = lookup("PRESENCE_STALE_SECS") {
            match val.parse::<i64>() {
                Ok(0) => config.presence_stale_after = None,
                Ok(secs) if secs > 0 => {
                    config.presence_stale_after = Some(Duration::seconds(secs))
                }
                _ => tracing::warn!(value = %val, "Invalid PRESENCE_STALE_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_pubkey(hex: &str) -> Result<[u8; 32], String> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex.len()));
    }

    let bytes = hex::decode(hex).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
