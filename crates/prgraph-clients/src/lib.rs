//! HTTP collaborators: an Ollama-backed [`Completion`] and a GitHub-backed
//! [`ConversationSource`].
//!
//! [`Completion`]: prgraph_extract::Completion
//! [`ConversationSource`]: prgraph_core::source::ConversationSource

pub mod github;
pub mod ollama;

pub use github::{GitHubClient, GitHubSettings, PullRequestRef};
pub use ollama::{OllamaClient, OllamaSettings};
