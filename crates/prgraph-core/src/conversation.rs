//! Pull-request conversations, the read-only input to extraction.
//!
//! [`RawConversation`] is the tolerant wire shape: every field is optional
//! and missing values get documented defaults. Converting it into a
//! [`PrConversation`] is where malformed input is rejected.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, graph::Properties};

pub const UNKNOWN_AUTHOR: &str = "unknown";
pub const DEFAULT_REPOSITORY: &str = "unknown/repo";
pub const DEFAULT_TITLE: &str = "PR Conversation";
pub const DEFAULT_COMMENT_TYPE: &str = "comment";

// ─── Validated model ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub id:           String,
  pub author:       String,
  pub created_at:   DateTime<Utc>,
  pub body:         String,
  #[serde(rename = "type")]
  pub comment_type: String,
  #[serde(default)]
  pub metadata:     Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrConversation {
  pub pr_number:    u64,
  pub repository:   String,
  pub title:        String,
  pub description:  String,
  /// Ordered oldest first.
  pub comments:     Vec<Comment>,
  pub participants: Vec<String>,
  pub created_at:   DateTime<Utc>,
  #[serde(default)]
  pub metadata:     Properties,
}

impl PrConversation {
  /// Distinct comment authors in first-seen order.
  pub fn authors(&self) -> Vec<String> { distinct_authors(&self.comments) }
}

fn distinct_authors(comments: &[Comment]) -> Vec<String> {
  let mut seen = HashSet::new();
  comments
    .iter()
    .filter(|c| seen.insert(c.author.as_str()))
    .map(|c| c.author.clone())
    .collect()
}

// ─── Wire shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawComment {
  pub id:         Option<String>,
  pub author:     Option<String>,
  pub created_at: Option<String>,
  pub body:       Option<String>,
  #[serde(rename = "type")]
  pub kind:       Option<String>,
  pub metadata:   Option<Properties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConversation {
  pub pr_number:    Option<u64>,
  pub repository:   Option<String>,
  pub title:        Option<String>,
  pub description:  Option<String>,
  pub comments:     Option<Vec<RawComment>>,
  pub participants: Option<Vec<String>>,
  pub created_at:   Option<String>,
  pub metadata:     Option<Properties>,
}

impl RawConversation {
  /// Apply defaults and validate, using `now` for missing timestamps.
  pub fn into_conversation_at(self, now: DateTime<Utc>) -> Result<PrConversation> {
    let raw_comments = self
      .comments
      .ok_or_else(|| Error::Validation("missing comments array".into()))?;

    let comments = raw_comments
      .into_iter()
      .enumerate()
      .map(|(index, raw)| {
        let created_at = match raw.created_at.as_deref() {
          Some(ts) => parse_timestamp(ts).map_err(|_| {
            Error::Validation(format!("comment {index}: bad timestamp {ts:?}"))
          })?,
          None => now,
        };
        Ok(Comment {
          id: raw.id.unwrap_or_else(|| index.to_string()),
          author: raw.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_owned()),
          created_at,
          body: raw.body.unwrap_or_default(),
          comment_type: raw.kind.unwrap_or_else(|| DEFAULT_COMMENT_TYPE.to_owned()),
          metadata: raw.metadata.unwrap_or_default(),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let created_at = match self.created_at.as_deref() {
      Some(ts) => parse_timestamp(ts)
        .map_err(|_| Error::Validation(format!("bad conversation timestamp {ts:?}")))?,
      None => now,
    };

    let participants = self.participants.unwrap_or_else(|| distinct_authors(&comments));

    Ok(PrConversation {
      pr_number: self.pr_number.unwrap_or(1),
      repository: self.repository.unwrap_or_else(|| DEFAULT_REPOSITORY.to_owned()),
      title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
      description: self.description.unwrap_or_default(),
      comments,
      participants,
      created_at,
      metadata: self.metadata.unwrap_or_default(),
    })
  }
}

impl TryFrom<RawConversation> for PrConversation {
  type Error = Error;

  fn try_from(raw: RawConversation) -> Result<Self> {
    raw.into_conversation_at(Utc::now())
  }
}

/// Parse an ISO-8601 timestamp. Offsets are honoured; naive timestamps are
/// taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|_| Error::Validation(format!("bad timestamp {s:?}")))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn raw_comment(author: Option<&str>, created_at: Option<&str>) -> RawComment {
    RawComment {
      author: author.map(str::to_owned),
      created_at: created_at.map(str::to_owned),
      body: Some("hello".into()),
      ..RawComment::default()
    }
  }

  #[test]
  fn missing_fields_get_defaults() {
    let now = Utc.with_ymd_and_hms(2025, 7, 21, 18, 0, 0).unwrap();
    let raw = RawConversation {
      comments: Some(vec![
        raw_comment(None, None),
        raw_comment(Some("bob"), Some("2025-07-21T19:00:00Z")),
      ]),
      ..RawConversation::default()
    };

    let conv = raw.into_conversation_at(now).unwrap();
    assert_eq!(conv.pr_number, 1);
    assert_eq!(conv.repository, "unknown/repo");
    assert_eq!(conv.title, "PR Conversation");
    assert_eq!(conv.created_at, now);

    assert_eq!(conv.comments[0].id, "0");
    assert_eq!(conv.comments[0].author, "unknown");
    assert_eq!(conv.comments[0].created_at, now);
    assert_eq!(conv.comments[0].comment_type, "comment");
    assert_eq!(conv.comments[1].id, "1");
    assert_eq!(conv.participants, vec!["unknown", "bob"]);
  }

  #[test]
  fn missing_comments_is_a_validation_error() {
    let err = PrConversation::try_from(RawConversation::default()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn bad_timestamp_is_a_validation_error() {
    let raw = RawConversation {
      comments: Some(vec![raw_comment(Some("alice"), Some("yesterday"))]),
      ..RawConversation::default()
    };
    assert!(matches!(
      PrConversation::try_from(raw).unwrap_err(),
      Error::Validation(_)
    ));
  }

  #[test]
  fn naive_timestamps_are_utc() {
    let ts = parse_timestamp("2025-01-15T10:30:00").unwrap();
    assert_eq!(ts, Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap());

    let offset = parse_timestamp("2025-01-15T12:30:00+02:00").unwrap();
    assert_eq!(offset, ts);
  }

  #[test]
  fn authors_are_distinct_in_first_seen_order() {
    let raw = RawConversation {
      comments: Some(vec![
        raw_comment(Some("x"), None),
        raw_comment(Some("y"), None),
        raw_comment(Some("x"), None),
        raw_comment(Some("z"), None),
      ]),
      ..RawConversation::default()
    };
    let conv = PrConversation::try_from(raw).unwrap();
    assert_eq!(conv.authors(), vec!["x", "y", "z"]);
  }
}
