//! Entities: typed, deduplicated named things in the fact store.
//!
//! An entity is identified by its `(type, value)` pair. Inserting the same
//! pair twice is a no-op: the first write's metadata wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::EntityKey;

/// A stored entity. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id:     Uuid,
  #[serde(rename = "type")]
  pub kind:          String,
  pub value:         String,
  /// Arbitrary JSON metadata supplied on first insert.
  pub metadata:      Option<serde_json::Value>,
  /// The source record that first produced this entity. Lookup only.
  pub first_seen_in: Option<String>,
  pub created_at:    DateTime<Utc>,
}

impl Entity {
  pub fn key(&self) -> EntityKey { EntityKey::new(&self.kind, &self.value) }
}

/// Input to [`crate::store::FactStore::add_entity`].
/// `entity_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewEntity {
  pub kind:          String,
  pub value:         String,
  pub metadata:      Option<serde_json::Value>,
  pub first_seen_in: Option<String>,
}

impl NewEntity {
  /// Convenience constructor with no metadata and no back-reference.
  pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      kind:          kind.into(),
      value:         value.into(),
      metadata:      None,
      first_seen_in: None,
    }
  }

  pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
    self.metadata = Some(metadata);
    self
  }

  pub fn first_seen_in(mut self, source: impl Into<String>) -> Self {
    self.first_seen_in = Some(source.into());
    self
  }
}
