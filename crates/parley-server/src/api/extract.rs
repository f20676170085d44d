//! Extractors whose rejections go through [`ServerError`], so clients always
//! get the `{error, code}` body.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ServerError;

/// `axum::Json` with malformed bodies reported as `bad_request`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with unparsable ids reported as `not_found`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServerError))]
pub struct ApiPath<T>(pub T);
