//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! A failed store read never surfaces as a server error: the service reports
//! it as not found, so analysis lookups and `/store/*` views both answer 404.
//! 503 is reserved for servers running without a store.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use prgraph_service::ServiceError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unavailable: {0}")]
  Unavailable(String),
}

impl From<ServiceError> for ApiError {
  fn from(e: ServiceError) -> Self {
    match e {
      e @ ServiceError::NotFound(_) => Self::NotFound(e.to_string()),
      ServiceError::Validation(msg) => Self::BadRequest(msg),
      e @ ServiceError::StoreUnavailable => Self::Unavailable(e.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
