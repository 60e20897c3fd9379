//! String key encodings shared by every producer and consumer of store keys.
//!
//! Three shapes exist:
//!
//! | Shape | Example |
//! |-------|---------|
//! | entity key | `participant:alice` |
//! | node key | `analysis_<uuid>:node:alice` |
//! | relationship key | `<subject node key>:<predicate>:<object node key>` |
//!
//! Nothing outside this module formats or splits these strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

const ANALYSIS_PREFIX: &str = "analysis_";
const NODE_SEGMENT: &str = ":node:";

// ─── Entity keys ─────────────────────────────────────────────────────────────

/// A `type:value` composite identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
  pub kind:  String,
  pub value: String,
}

impl EntityKey {
  pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
    Self { kind: kind.into(), value: value.into() }
  }

  /// Encode as `type:value`.
  pub fn encode(&self) -> String { format!("{}:{}", self.kind, self.value) }

  /// Decode a `type:value` string. Splits on the first `:` only, so values
  /// may contain further colons. Both halves must be non-empty.
  pub fn parse(s: &str) -> Result<Self> {
    match s.split_once(':') {
      Some((kind, value)) if !kind.is_empty() && !value.is_empty() => {
        Ok(Self::new(kind, value))
      }
      _ => Err(Error::InvalidKey(s.to_owned())),
    }
  }
}

impl fmt::Display for EntityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.value)
  }
}

// ─── Analysis namespacing ────────────────────────────────────────────────────

/// The persistent identifier under which an analysis is namespaced in a
/// shared store.
pub fn persistent_analysis_id(analysis_id: &str) -> String {
  if analysis_id.starts_with(ANALYSIS_PREFIX) {
    analysis_id.to_owned()
  } else {
    format!("{ANALYSIS_PREFIX}{analysis_id}")
  }
}

/// The analysis UUID behind either `"<uuid>"` or `"analysis_<uuid>"`.
pub fn parse_analysis_id(id: &str) -> Option<Uuid> {
  Uuid::parse_str(id.strip_prefix(ANALYSIS_PREFIX).unwrap_or(id)).ok()
}

/// `"{analysis}:node:{node}"`.
pub fn node_key(analysis: &str, node_id: &str) -> String {
  format!("{analysis}{NODE_SEGMENT}{node_id}")
}

/// The prefix shared by every node key of `analysis`.
pub fn node_key_prefix(analysis: &str) -> String {
  format!("{analysis}{NODE_SEGMENT}")
}

/// Recover the node id from a node key of `analysis`. Returns `None` when the
/// key belongs to another namespace.
pub fn strip_node_key<'a>(analysis: &str, key: &'a str) -> Option<&'a str> {
  key
    .strip_prefix(analysis)
    .and_then(|rest| rest.strip_prefix(NODE_SEGMENT))
}

/// `"{subject key}:{predicate}:{object key}"`.
pub fn relationship_key(subject_key: &str, predicate: &str, object_key: &str) -> String {
  format!("{subject_key}:{predicate}:{object_key}")
}
