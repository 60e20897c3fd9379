//! Triples: immutable `(subject, predicate, object)` facts.
//!
//! Triples are append-only. There is no update or delete; a correction is a
//! new fact. `(subject, predicate, object)` is unique and re-inserting it is
//! silently ignored, so the confidence and provenance of the first insert win.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Confidence assigned to facts that do not specify one.
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// A stored fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
  pub triple_id:   Uuid,
  pub subject:     String,
  pub predicate:   String,
  pub object:      String,
  pub confidence:  f64,
  /// Kind of record that produced this fact (e.g. `"analysis"`).
  pub source_type: Option<String>,
  /// Identifier of the record that produced this fact.
  pub source_id:   Option<String>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::FactStore::add_triple`].
#[derive(Debug, Clone)]
pub struct NewTriple {
  pub subject:     String,
  pub predicate:   String,
  pub object:      String,
  pub confidence:  f64,
  pub source_type: Option<String>,
  pub source_id:   Option<String>,
}

impl NewTriple {
  pub fn new(
    subject: impl Into<String>,
    predicate: impl Into<String>,
    object: impl Into<String>,
  ) -> Self {
    Self {
      subject:     subject.into(),
      predicate:   predicate.into(),
      object:      object.into(),
      confidence:  DEFAULT_CONFIDENCE,
      source_type: None,
      source_id:   None,
    }
  }

  pub fn with_confidence(mut self, confidence: f64) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn with_source(
    mut self,
    source_type: impl Into<String>,
    source_id: impl Into<String>,
  ) -> Self {
    self.source_type = Some(source_type.into());
    self.source_id = Some(source_id.into());
    self
  }

  /// Reject confidences outside `[0, 1]` (NaN included).
  pub fn validate(&self) -> Result<()> {
    validate_confidence(self.confidence)
  }
}

pub fn validate_confidence(confidence: f64) -> Result<()> {
  if (0.0..=1.0).contains(&confidence) {
    Ok(())
  } else {
    Err(Error::InvalidConfidence(confidence))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_triple_defaults_to_full_confidence() {
    let t = NewTriple::new("participant:alice", "ANALYZES", "issue:auth");
    assert_eq!(t.confidence, 1.0);
    assert!(t.source_type.is_none());
    assert!(t.validate().is_ok());
  }

  #[test]
  fn out_of_range_confidence_is_rejected() {
    assert!(NewTriple::new("a", "b", "c").with_confidence(1.5).validate().is_err());
    assert!(NewTriple::new("a", "b", "c").with_confidence(-0.1).validate().is_err());
    assert!(NewTriple::new("a", "b", "c").with_confidence(f64::NAN).validate().is_err());
    assert!(NewTriple::new("a", "b", "c").with_confidence(0.0).validate().is_ok());
  }
}
