//! # parley-server
//!
//! HTTP front end of the Parley chat backend.
//!
//! - **REST API** (axum) exposing every chat operation, authenticated by
//!   identity-provider bearer tokens
//! - **Object storage** for file messages: expiring single-use upload
//!   tickets, raw uploads and read URLs
//! - **Configuration** from environment variables

pub mod api;
pub mod auth;
pub mod blob_store;
pub mod config;
pub mod error;
