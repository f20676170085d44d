//! Object storage for file messages.
//!
//! Uploads are two-step: an authenticated client asks for an upload ticket,
//! which reserves a storage reference and an upload URL, then posts the raw
//! bytes to that URL. Tickets are single-use and expire. Stored objects are
//! served back at `{public_base_url}/blob/{storage_ref}`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use parley_store::FileUrlResolver;

use crate::error::ServerError;

/// Answer to `generateUploadUrl`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadTicket {
    pub upload_url: String,
    pub storage_ref: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
    public_base_url: String,
    ticket_ttl: Duration,
    /// Outstanding tickets: storage ref -> expiry.
    tickets: Arc<RwLock<HashMap<Uuid, DateTime<Utc>>>>,
}

impl BlobStore {
    pub async fn new(
        base_path: PathBuf,
        max_size: usize,
        public_base_url: String,
        ticket_ttl: Duration,
    ) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Upstream(format!(
                "Failed to create blob directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Blob store initialized");

        Ok(Self {
            base_path,
            max_size,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            ticket_ttl,
            tickets: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Reserve a fresh storage reference and the URL to upload it to.
    pub async fn issue_upload_ticket(&self) -> UploadTicket {
        let storage_ref = Uuid::new_v4();
        let expires_at = Utc::now() + self.ticket_ttl;

        self.tickets.write().await.insert(storage_ref, expires_at);
        debug!(storage_ref = %storage_ref, %expires_at, "Issued upload ticket");

        UploadTicket {
            upload_url: format!("{}/blob/upload/{}", self.public_base_url, storage_ref),
            storage_ref: storage_ref.to_string(),
            expires_at,
        }
    }

    /// Store the bytes for a live ticket. The ticket is consumed.
    pub async fn store_upload(&self, storage_ref: &str, data: &[u8]) -> Result<(), ServerError> {
        let id = parse_ref(storage_ref).ok_or(ServerError::UploadTicketInvalid)?;

        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::BlobTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        {
            let mut tickets = self.tickets.write().await;
            match tickets.remove(&id) {
                Some(expires_at) if Utc::now() < expires_at => {}
                _ => return Err(ServerError::UploadTicketInvalid),
            }
        }

        let path = self.blob_path(&id);
        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::Upstream(format!("Failed to write blob {}: {}", id, e)))?;

        info!(storage_ref = %id, size = data.len(), "Stored upload");
        Ok(())
    }

    pub async fn get_blob(&self, storage_ref: &str) -> Result<Vec<u8>, ServerError> {
        let id = parse_ref(storage_ref)
            .ok_or_else(|| ServerError::BlobNotFound(storage_ref.to_string()))?;
        let path = self.blob_path(&id);

        if !path.exists() {
            return Err(ServerError::BlobNotFound(storage_ref.to_string()));
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| ServerError::Upstream(format!("Failed to read blob {}: {}", id, e)))?;

        debug!(storage_ref = %id, size = data.len(), "Retrieved blob");
        Ok(data)
    }

    /// Whether an object is stored under `storage_ref`.
    pub fn contains(&self, storage_ref: &str) -> bool {
        parse_ref(storage_ref)
            .map(|id| self.blob_path(&id).is_file())
            .unwrap_or(false)
    }

    /// Public read URL, or `None` when nothing is stored under the reference.
    pub fn read_url(&self, storage_ref: &str) -> Option<String> {
        if !self.contains(storage_ref) {
            return None;
        }
        Some(format!("{}/blob/{}", self.public_base_url, storage_ref.trim()))
    }

    /// Drop tickets whose upload window has passed.
    pub async fn purge_expired_tickets(&self) {
        let now = Utc::now();
        let mut tickets = self.tickets.write().await;
        let before = tickets.len();
        tickets.retain(|_, expires_at| now < *expires_at);
        let removed = before - tickets.len();
        if removed > 0 {
            debug!(removed, "Purged expired upload tickets");
        }
    }

    /// Only canonical UUIDs reach the filesystem, so a reference can never
    /// name a path outside `base_path`.
    fn blob_path(&self, id: &Uuid) -> PathBuf {
        self.base_path.join(id.to_string())
    }
}

impl FileUrlResolver for BlobStore {
    fn file_url(&self, storage_ref: &str) -> Option<String> {
        self.read_url(storage_ref)
    }
}

fn parse_ref(storage_ref: &str) -> Option<Uuid> {
    Uuid::parse_str(storage_ref.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store(ttl: Duration) -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(
            dir.path().to_path_buf(),
            1024 * 1024,
            "http://files.test/".into(),
            ttl,
        )
        .await
        .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_upload_and_read() {
        let (store, _dir) = test_store(Duration::minutes(5)).await;
        let ticket = store.issue_upload_ticket().await;
        assert_eq!(
            ticket.upload_url,
            format!("http://files.test/blob/upload/{}", ticket.storage_ref)
        );

        assert!(store.read_url(&ticket.storage_ref).is_none());
        store.store_upload(&ticket.storage_ref, b"pixels").await.unwrap();

        assert_eq!(store.get_blob(&ticket.storage_ref).await.unwrap(), b"pixels");
        assert_eq!(
            store.read_url(&ticket.storage_ref),
            Some(format!("http://files.test/blob/{}", ticket.storage_ref))
        );
    }

    #[tokio::test]
    async fn test_ticket_is_single_use() {
        let (store, _dir) = test_store(Duration::minutes(5)).await;
        let ticket = store.issue_upload_ticket().await;

        store.store_upload(&ticket.storage_ref, b"first").await.unwrap();
        let err = store.store_upload(&ticket.storage_ref, b"second").await.unwrap_err();
        assert!(matches!(err, ServerError::UploadTicketInvalid));
        assert_eq!(store.get_blob(&ticket.storage_ref).await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_expired_ticket_rejected() {
        let (store, _dir) = test_store(Duration::seconds(-1)).await;
        let ticket = store.issue_upload_ticket().await;

        let err = store.store_upload(&ticket.storage_ref, b"late").await.unwrap_err();
        assert!(matches!(err, ServerError::UploadTicketInvalid));

        store.purge_expired_tickets().await;
        assert!(store.tickets.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_unticketed_and_bad_refs() {
        let (store, _dir) = test_store(Duration::minutes(5)).await;

        let err = store
            .store_upload(&Uuid::new_v4().to_string(), b"data")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::UploadTicketInvalid));

        assert!(!store.contains("../../etc/passwd"));
        assert!(store.get_blob("../../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_and_oversized_rejected() {
        let (store, _dir) = test_store(Duration::minutes(5)).await;
        let ticket = store.issue_upload_ticket().await;

        assert!(store.store_upload(&ticket.storage_ref, b"").await.is_err());
        let big = vec![0u8; 1024 * 1024 + 1];
        let err = store.store_upload(&ticket.storage_ref, &big).await.unwrap_err();
        assert!(matches!(err, ServerError::BlobTooLarge { .. }));

        // Rejected payloads leave the ticket usable.
        store.store_upload(&ticket.storage_ref, b"ok").await.unwrap();
    }
}
