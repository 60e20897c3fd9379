//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 with a fixed microsecond width, so lexical order in
//! SQL equals chronological order. Metadata is compact JSON. UUIDs are
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use prgraph_core::{entity::Entity, triple::Triple};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_metadata(metadata: Option<&serde_json::Value>) -> Result<Option<String>> {
  Ok(metadata.map(serde_json::to_string).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const ENTITY_COLUMNS: &str =
  "entity_id, type, value, metadata, first_seen_in, created_at";

pub const TRIPLE_COLUMNS: &str =
  "triple_id, subject, predicate, object, confidence, source_type, source_id, created_at";

/// Raw column values of one `entities` row.
pub struct RawEntity {
  pub entity_id:     String,
  pub kind:          String,
  pub value:         String,
  pub metadata:      Option<String>,
  pub first_seen_in: Option<String>,
  pub created_at:    String,
}

impl RawEntity {
  /// Read a row selected with [`ENTITY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:     row.get(0)?,
      kind:          row.get(1)?,
      value:         row.get(2)?,
      metadata:      row.get(3)?,
      first_seen_in: row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_entity(self) -> Result<Entity> {
    let metadata = self
      .metadata
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(Entity {
      entity_id: decode_uuid(&self.entity_id)?,
      kind: self.kind,
      value: self.value,
      metadata,
      first_seen_in: self.first_seen_in,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw column values of one `triples` row.
pub struct RawTriple {
  pub triple_id:   String,
  pub subject:     String,
  pub predicate:   String,
  pub object:      String,
  pub confidence:  f64,
  pub source_type: Option<String>,
  pub source_id:   Option<String>,
  pub created_at:  String,
}

impl RawTriple {
  /// Read a row selected with [`TRIPLE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      triple_id:   row.get(0)?,
      subject:     row.get(1)?,
      predicate:   row.get(2)?,
      object:      row.get(3)?,
      confidence:  row.get(4)?,
      source_type: row.get(5)?,
      source_id:   row.get(6)?,
      created_at:  row.get(7)?,
    })
  }

  pub fn into_triple(self) -> Result<Triple> {
    Ok(Triple {
      triple_id:   decode_uuid(&self.triple_id)?,
      subject:     self.subject,
      predicate:   self.predicate,
      object:      self.object,
      confidence:  self.confidence,
      source_type: self.source_type,
      source_id:   self.source_id,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
