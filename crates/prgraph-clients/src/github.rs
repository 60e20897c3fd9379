//! [`ConversationSource`] backed by the GitHub REST API.
//!
//! A conversation is the pull request itself plus its issue comments and
//! review comments, merged and ordered by creation time.

use std::fmt;

use async_trait::async_trait;
use prgraph_core::{
  conversation::{Comment, PrConversation, parse_timestamp},
  graph::Properties,
  source::{ConversationSource, SourceError},
};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
  pub api_url: String,
  pub token:   Option<String>,
}

impl Default for GitHubSettings {
  fn default() -> Self { Self { api_url: "https://api.github.com".into(), token: None } }
}

// ─── URL parsing ─────────────────────────────────────────────────────────────

/// `owner/repo#number`, parsed from a pull-request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
  pub owner:  String,
  pub repo:   String,
  pub number: u64,
}

impl PullRequestRef {
  /// Accepts `https://github.com/{owner}/{repo}/pull/{n}` with optional
  /// trailing path segments, query or fragment.
  pub fn parse(url: &str) -> Result<Self, SourceError> {
    let invalid = || SourceError::InvalidUrl(url.to_owned());

    let rest = url
      .strip_prefix("https://github.com/")
      .or_else(|| url.strip_prefix("http://github.com/"))
      .ok_or_else(invalid)?;
    let path = rest.split(['?', '#']).next().unwrap_or_default();

    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
      (Some(owner), Some(repo), Some("pull"), Some(number))
        if !owner.is_empty() && !repo.is_empty() =>
      {
        let number = number.parse().map_err(|_| invalid())?;
        Ok(Self { owner: owner.to_owned(), repo: repo.to_owned(), number })
      }
      _ => Err(invalid()),
    }
  }

  pub fn repository(&self) -> String { format!("{}/{}", self.owner, self.repo) }
}

impl fmt::Display for PullRequestRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GhUser {
  login: String,
}

#[derive(Debug, Deserialize)]
struct GhRef {
  #[serde(rename = "ref")]
  name: String,
}

#[derive(Debug, Deserialize)]
struct GhPullRequest {
  title:      String,
  body:       Option<String>,
  created_at: String,
  html_url:   Option<String>,
  state:      Option<String>,
  #[serde(default)]
  merged:     bool,
  base:       Option<GhRef>,
  head:       Option<GhRef>,
}

#[derive(Debug, Deserialize)]
struct GhComment {
  id:         u64,
  user:       Option<GhUser>,
  body:       Option<String>,
  created_at: String,
  html_url:   Option<String>,
  updated_at: Option<String>,
  // Review comments only.
  diff_hunk:  Option<String>,
  path:       Option<String>,
  position:   Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum CommentKind {
  Issue,
  Review,
}

impl GhComment {
  fn into_comment(self, kind: CommentKind) -> Result<Comment, SourceError> {
    let mut metadata = Properties::new();
    metadata.insert("html_url".into(), json!(self.html_url));
    let comment_type = match kind {
      CommentKind::Issue => {
        metadata.insert("updated_at".into(), json!(self.updated_at));
        "comment"
      }
      CommentKind::Review => {
        metadata.insert("diff_hunk".into(), json!(self.diff_hunk.unwrap_or_default()));
        metadata.insert("path".into(), json!(self.path.unwrap_or_default()));
        metadata.insert("position".into(), json!(self.position));
        "review_comment"
      }
    };

    Ok(Comment {
      id: self.id.to_string(),
      author: self
        .user
        .map(|u| u.login)
        .unwrap_or_else(|| prgraph_core::conversation::UNKNOWN_AUTHOR.to_owned()),
      created_at: parse_timestamp(&self.created_at)?,
      body: self.body.unwrap_or_default(),
      comment_type: comment_type.to_owned(),
      metadata,
    })
  }
}

fn build_conversation(
  pr_ref: &PullRequestRef,
  pr: GhPullRequest,
  issue_comments: Vec<GhComment>,
  review_comments: Vec<GhComment>,
) -> Result<PrConversation, SourceError> {
  let mut comments = issue_comments
    .into_iter()
    .map(|c| c.into_comment(CommentKind::Issue))
    .chain(review_comments.into_iter().map(|c| c.into_comment(CommentKind::Review)))
    .collect::<Result<Vec<_>, _>>()?;
  comments.sort_by_key(|c| c.created_at);

  let mut metadata = Properties::new();
  metadata.insert("html_url".into(), json!(pr.html_url));
  metadata.insert("state".into(), json!(pr.state));
  metadata.insert("merged".into(), json!(pr.merged));
  metadata.insert("base_branch".into(), json!(pr.base.map(|r| r.name)));
  metadata.insert("head_branch".into(), json!(pr.head.map(|r| r.name)));

  let mut conversation = PrConversation {
    pr_number: pr_ref.number,
    repository: pr_ref.repository(),
    title: pr.title,
    description: pr.body.unwrap_or_default(),
    comments,
    participants: Vec::new(),
    created_at: parse_timestamp(&pr.created_at)?,
    metadata,
  };
  conversation.participants = conversation.authors();
  Ok(conversation)
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct GitHubClient {
  client:  Client,
  api_url: String,
  token:   Option<String>,
}

impl GitHubClient {
  pub fn new(settings: &GitHubSettings) -> Result<Self, SourceError> {
    let client = Client::builder()
      .user_agent(concat!("prgraph/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| SourceError::Upstream(e.to_string()))?;
    Ok(Self {
      client,
      api_url: settings.api_url.trim_end_matches('/').to_owned(),
      token: settings.token.clone(),
    })
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
    let url = format!("{}{path}", self.api_url);
    let mut req = self
      .client
      .get(&url)
      .header("Accept", "application/vnd.github+json");
    if let Some(token) = &self.token {
      req = req.bearer_auth(token);
    }

    debug!(url = %url, "GitHub API request");

    let resp = req
      .send()
      .await
      .map_err(|e| SourceError::Upstream(format!("GitHub API: {e}")))?;
    if !resp.status().is_success() {
      let status = resp.status().as_u16();
      let body = resp.text().await.unwrap_or_default();
      return Err(SourceError::Upstream(format!("GitHub API {status}: {body}")));
    }
    resp
      .json()
      .await
      .map_err(|e| SourceError::Upstream(format!("parse response: {e}")))
  }

  pub async fn fetch_pull_request(&self, pr_ref: &PullRequestRef) -> Result<PrConversation, SourceError> {
    let PullRequestRef { owner, repo, number } = pr_ref;
    let pr: GhPullRequest = self.get(&format!("/repos/{owner}/{repo}/pulls/{number}")).await?;
    let issue_comments: Vec<GhComment> = self
      .get(&format!("/repos/{owner}/{repo}/issues/{number}/comments"))
      .await?;
    let review_comments: Vec<GhComment> = self
      .get(&format!("/repos/{owner}/{repo}/pulls/{number}/comments"))
      .await?;

    let conversation = build_conversation(pr_ref, pr, issue_comments, review_comments)?;
    info!(
      pull_request = %pr_ref,
      comments = conversation.comments.len(),
      "fetched pull request conversation",
    );
    Ok(conversation)
  }
}

#[async_trait]
impl ConversationSource for GitHubClient {
  async fn fetch(&self, url: &str) -> Result<PrConversation, SourceError> {
    let pr_ref = PullRequestRef::parse(url)?;
    self.fetch_pull_request(&pr_ref).await
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, routing::get};
  use serde_json::Value;

  use super::*;
  use crate::mock;

  #[test]
  fn parses_pull_request_urls() {
    let parsed = PullRequestRef::parse("https://github.com/acme/widgets/pull/42").unwrap();
    assert_eq!(parsed, PullRequestRef {
      owner:  "acme".into(),
      repo:   "widgets".into(),
      number: 42,
    });
    assert_eq!(parsed.to_string(), "acme/widgets#42");

    let with_tail = PullRequestRef::parse("https://github.com/acme/widgets/pull/42/files?w=1").unwrap();
    assert_eq!(with_tail.number, 42);
  }

  #[test]
  fn rejects_other_urls() {
    for url in [
      "https://gitlab.com/acme/widgets/pull/42",
      "https://github.com/acme/widgets/issues/42",
      "https://github.com/acme/widgets/pull/abc",
      "https://github.com/acme",
      "not a url",
    ] {
      assert!(
        matches!(PullRequestRef::parse(url), Err(SourceError::InvalidUrl(_))),
        "{url}"
      );
    }
  }

  fn pr_json() -> Value {
    json!({
      "title": "Fix auth",
      "body": null,
      "created_at": "2025-07-21T17:00:00Z",
      "html_url": "https://github.com/acme/widgets/pull/42",
      "state": "open",
      "base": { "ref": "main" },
      "head": { "ref": "fix-auth" },
    })
  }

  #[tokio::test]
  async fn fetches_and_merges_comments_in_time_order() {
    let app = Router::new()
      .route("/repos/acme/widgets/pulls/42", get(|| async { Json(pr_json()) }))
      .route(
        "/repos/acme/widgets/issues/42/comments",
        get(|| async {
          Json(json!([
            { "id": 1, "user": { "login": "jack" }, "body": "first",
              "created_at": "2025-07-21T18:00:00Z" },
            { "id": 3, "user": { "login": "jack" }, "body": "third",
              "created_at": "2025-07-21T18:20:00Z" },
          ]))
        }),
      )
      .route(
        "/repos/acme/widgets/pulls/42/comments",
        get(|| async {
          Json(json!([
            { "id": 2, "user": { "login": "devin-ai-integration[bot]" }, "body": "second",
              "created_at": "2025-07-21T18:10:00Z", "path": "src/auth.rs", "position": 7 },
          ]))
        }),
      );
    let api_url = mock::serve(app).await;
    let client = GitHubClient::new(&GitHubSettings { api_url, token: Some("t".into()) }).unwrap();

    let conv = client
      .fetch("https://github.com/acme/widgets/pull/42")
      .await
      .unwrap();

    assert_eq!(conv.pr_number, 42);
    assert_eq!(conv.repository, "acme/widgets");
    assert_eq!(conv.description, "");
    let bodies: Vec<_> = conv.comments.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second", "third"]);
    assert_eq!(conv.comments[1].comment_type, "review_comment");
    assert_eq!(conv.comments[1].metadata["path"], "src/auth.rs");
    assert_eq!(conv.participants, vec!["jack", "devin-ai-integration[bot]"]);
    assert_eq!(conv.metadata["base_branch"], "main");
  }

  #[tokio::test]
  async fn upstream_failure_is_reported() {
    let api_url = mock::serve(Router::new()).await;
    let client = GitHubClient::new(&GitHubSettings { api_url, token: None }).unwrap();

    let err = client
      .fetch("https://github.com/acme/widgets/pull/42")
      .await
      .unwrap_err();
    assert!(matches!(err, SourceError::Upstream(_)));
  }
}
