//! Where conversations come from when they are not supplied inline.

use async_trait::async_trait;

use crate::conversation::PrConversation;

/// Fetches a pull-request conversation by URL.
///
/// Used behind `dyn`, hence `async_trait` rather than native async methods.
#[async_trait]
pub trait ConversationSource: Send + Sync {
  async fn fetch(&self, url: &str) -> Result<PrConversation, SourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
  #[error("unsupported pull request url: {0}")]
  InvalidUrl(String),

  #[error("upstream request failed: {0}")]
  Upstream(String),

  #[error(transparent)]
  Conversation(#[from] crate::Error),
}
