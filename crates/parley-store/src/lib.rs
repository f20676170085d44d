//! # parley-store
//!
//! SQLite-backed state for the Parley chat backend.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection`. Every mutation runs inside a single SQLite
//! transaction and re-validates conversation membership from current state,
//! so callers that serialize access to the handle (the server keeps it behind
//! a mutex) get serializable units of work. Reads recompute enriched views
//! from current rows on every call; there is no cache.

pub mod clock;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod presence;
pub mod reactions;
pub mod search;
pub mod typing;
pub mod unread;
pub mod users;
pub mod views;

mod error;
mod sql;

pub use clock::Clock;
pub use database::Database;
pub use error::{ErrorKind, Result, StoreError, ValidationError};
pub use models::*;
pub use views::*;
