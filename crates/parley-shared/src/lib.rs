//! # parley-shared
//!
//! Types and constants shared between the Parley server and its clients:
//! strongly-typed record ids, the allowed reaction set, timing constants and
//! the signed identity token issued by the identity provider.

pub mod constants;
pub mod error;
pub mod identity_token;
pub mod types;

pub use types::{ConversationId, MessageId, UserId};
