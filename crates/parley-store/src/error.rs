use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// No verified identity is attached to the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The identity is verified but no user row exists for its subject.
    #[error("User profile not found. Sync user first.")]
    ProfileNotSynced,

    /// The conversation does not exist or the caller is not a member.
    #[error("Conversation not found.")]
    ConversationNotFound,

    #[error("Message not found.")]
    MessageNotFound,

    #[error("User not found.")]
    UserNotFound,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Soft delete attempted by someone other than the sender.
    #[error("You can only delete your own message.")]
    NotOwner,
}

/// Input rejected before anything is written.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message cannot be empty.")]
    EmptyMessage,

    #[error("Group name is required.")]
    InvalidTitle,

    #[error("Please add at least 2 teammates to create a group.")]
    InsufficientMembers,

    #[error("One or more members were not found.")]
    UnknownMember,

    #[error("Unsupported reaction.")]
    UnsupportedReaction,

    #[error("You cannot start a chat with yourself.")]
    SelfConversation,

    #[error("A file message needs a storage reference.")]
    MissingStorageRef,

    #[error("File size cannot be negative.")]
    InvalidFileSize,
}

/// Coarse classification of a [`StoreError`], mirroring what clients can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    ProfileNotSynced,
    NotFound,
    Validation,
    NotOwner,
    Internal,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unauthenticated => ErrorKind::Unauthenticated,
            StoreError::ProfileNotSynced => ErrorKind::ProfileNotSynced,
            StoreError::ConversationNotFound
            | StoreError::MessageNotFound
            | StoreError::UserNotFound => ErrorKind::NotFound,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::NotOwner => ErrorKind::NotOwner,
            StoreError::Sqlite(_)
            | StoreError::NoDataDir
            | StoreError::Io(_)
            | StoreError::Migration(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
