use axum::extract::{FromRequest, FromRequestParts};

use crate::errors::AppError;

/// `Json` extractor whose rejections render as the API's JSON error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path` extractor with the same error body, e.g. for a malformed resume id.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
