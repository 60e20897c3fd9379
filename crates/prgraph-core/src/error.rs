//! Error types for `prgraph-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid conversation: {0}")]
  Validation(String),

  #[error("confidence {0} is outside [0, 1]")]
  InvalidConfidence(f64),

  #[error("malformed key: {0:?}")]
  InvalidKey(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
