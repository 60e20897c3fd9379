//! The `FactStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `prgraph-store-sqlite`).
//! Higher layers (the graph adapter, the HTTP API) depend on this
//! abstraction, not on any concrete backend.

use std::{collections::BTreeMap, future::Future};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::{Entity, NewEntity},
  triple::{NewTriple, Triple},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`FactStore::get_triples`]. Every filter is optional; an
/// empty query scans the whole table up to `limit`.
#[derive(Debug, Clone, Default)]
pub struct TripleQuery {
  pub subject:            Option<String>,
  pub predicate:          Option<String>,
  pub object:             Option<String>,
  /// Exact (non-pattern) prefix match on `subject`.
  pub subject_prefix:     Option<String>,
  pub exclude_predicates: Vec<String>,
  /// `None` means unbounded.
  pub limit:              Option<usize>,
}

impl TripleQuery {
  pub fn subject(subject: impl Into<String>) -> Self {
    Self { subject: Some(subject.into()), ..Self::default() }
  }

  pub fn object(object: impl Into<String>) -> Self {
    Self { object: Some(object.into()), ..Self::default() }
  }

  pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
    self.predicate = Some(predicate.into());
    self
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }
}

/// Aggregate counts over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStatistics {
  pub triple_count: u64,
  pub entity_count: u64,
  /// Entity count per entity type.
  pub entity_types: BTreeMap<String, u64>,
  /// Triple count per predicate.
  pub predicates:   BTreeMap<String, u64>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an append-only entity and triple store.
///
/// Writes are insert-or-ignore: entities are unique on `(type, value)`,
/// triples on `(subject, predicate, object)`. Nothing is ever updated or
/// deleted. Each call commits on its own; no atomicity spans calls.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait FactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert an entity unless `(type, value)` already exists. Returns the id
  /// of the stored entity in either case.
  fn add_entity(
    &self,
    input: NewEntity,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  /// Insert a triple unless `(subject, predicate, object)` already exists.
  /// Returns the id of the stored triple in either case.
  fn add_triple(
    &self,
    input: NewTriple,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Triples matching `query`, newest first.
  fn get_triples<'a>(
    &'a self,
    query: &'a TripleQuery,
  ) -> impl Future<Output = Result<Vec<Triple>, Self::Error>> + Send + 'a;

  /// Look up a single entity by its `(type, value)` identity.
  fn get_entity<'a>(
    &'a self,
    kind: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// Entities of one type, newest first.
  fn get_entities_by_type<'a>(
    &'a self,
    kind: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// Entities with exactly this value, whatever their type, oldest first.
  fn find_entities<'a>(
    &'a self,
    value: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// Entities whose value contains `needle`. The match is case-sensitive.
  fn search_entities<'a>(
    &'a self,
    needle: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// Counts of triples and entities, broken down by predicate and type.
  fn get_statistics(
    &self,
  ) -> impl Future<Output = Result<StoreStatistics, Self::Error>> + Send + '_;
}
