//! [`SqliteStore`], the SQLite implementation of [`FactStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value};
use tracing::trace;
use uuid::Uuid;

use prgraph_core::{
  entity::{Entity, NewEntity},
  store::{FactStore, StoreStatistics, TripleQuery},
  triple::{NewTriple, Triple},
};

use crate::{
  Result,
  encode::{
    ENTITY_COLUMNS, RawEntity, RawTriple, TRIPLE_COLUMNS, decode_uuid, encode_dt,
    encode_metadata, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A prgraph fact store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run an entity `SELECT` whose column list is [`ENTITY_COLUMNS`].
  async fn select_entities(&self, sql: String, args: Vec<Value>) -> Result<Vec<Entity>> {
    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawEntity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }
}

/// SQLite reads a negative `LIMIT` as "no limit".
fn sql_limit(limit: Option<usize>) -> Value {
  Value::Integer(limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX)))
}

/// Build the `WHERE` clause and positional arguments for a triple query.
fn triple_filter(query: &TripleQuery) -> (String, Vec<Value>) {
  let mut conds: Vec<String> = vec![];
  let mut args: Vec<Value> = vec![];

  let equals = [
    ("subject", &query.subject),
    ("predicate", &query.predicate),
    ("object", &query.object),
  ];
  for (column, filter) in equals {
    if let Some(v) = filter {
      conds.push(format!("{column} = ?"));
      args.push(Value::Text(v.clone()));
    }
  }

  // Plain prefix comparison; LIKE would treat `_` and `%` in keys as patterns.
  if let Some(prefix) = &query.subject_prefix {
    conds.push("substr(subject, 1, length(?)) = ?".into());
    args.push(Value::Text(prefix.clone()));
    args.push(Value::Text(prefix.clone()));
  }

  if !query.exclude_predicates.is_empty() {
    let placeholders = vec!["?"; query.exclude_predicates.len()].join(", ");
    conds.push(format!("predicate NOT IN ({placeholders})"));
    args.extend(query.exclude_predicates.iter().cloned().map(Value::Text));
  }

  let where_clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  (where_clause, args)
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn add_entity(&self, input: NewEntity) -> Result<Uuid> {
    let id_str        = encode_uuid(Uuid::new_v4());
    let at_str        = encode_dt(Utc::now());
    let metadata_str  = encode_metadata(input.metadata.as_ref())?;
    let kind          = input.kind;
    let value         = input.value;
    let first_seen_in = input.first_seen_in;

    let stored: String = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO entities (entity_id, type, value, metadata, first_seen_in, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (type, value) DO NOTHING",
          rusqlite::params![id_str, kind, value, metadata_str, first_seen_in, at_str],
        )?;
        if inserted == 0 {
          trace!(%kind, %value, "entity already present");
        }
        let id = conn.query_row(
          "SELECT entity_id FROM entities WHERE type = ?1 AND value = ?2",
          rusqlite::params![kind, value],
          |row| row.get(0),
        )?;
        Ok(id)
      })
      .await?;

    decode_uuid(&stored)
  }

  async fn add_triple(&self, input: NewTriple) -> Result<Uuid> {
    input.validate()?;

    let id_str      = encode_uuid(Uuid::new_v4());
    let at_str      = encode_dt(Utc::now());
    let NewTriple { subject, predicate, object, confidence, source_type, source_id } =
      input;

    let stored: String = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO triples (
             triple_id, subject, predicate, object,
             confidence, source_type, source_id, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (subject, predicate, object) DO NOTHING",
          rusqlite::params![
            id_str,
            subject,
            predicate,
            object,
            confidence,
            source_type,
            source_id,
            at_str,
          ],
        )?;
        if inserted == 0 {
          trace!(%subject, %predicate, %object, "triple already present");
        }
        let id = conn.query_row(
          "SELECT triple_id FROM triples
           WHERE subject = ?1 AND predicate = ?2 AND object = ?3",
          rusqlite::params![subject, predicate, object],
          |row| row.get(0),
        )?;
        Ok(id)
      })
      .await?;

    decode_uuid(&stored)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_triples<'a>(&'a self, query: &'a TripleQuery) -> Result<Vec<Triple>> {
    let (where_clause, mut args) = triple_filter(query);
    args.push(sql_limit(query.limit));

    let sql = format!(
      "SELECT {TRIPLE_COLUMNS} FROM triples
       {where_clause}
       ORDER BY created_at DESC, rowid DESC
       LIMIT ?"
    );

    let raws: Vec<RawTriple> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawTriple::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTriple::into_triple).collect()
  }

  async fn get_entity<'a>(&'a self, kind: &'a str, value: &'a str) -> Result<Option<Entity>> {
    let kind = kind.to_owned();
    let value = value.to_owned();

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE type = ?1 AND value = ?2"),
            rusqlite::params![kind, value],
            RawEntity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn get_entities_by_type<'a>(&'a self, kind: &'a str, limit: usize) -> Result<Vec<Entity>> {
    self
      .select_entities(
        format!(
          "SELECT {ENTITY_COLUMNS} FROM entities WHERE type = ?
           ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ),
        vec![Value::Text(kind.to_owned()), sql_limit(Some(limit))],
      )
      .await
  }

  async fn find_entities<'a>(&'a self, value: &'a str, limit: usize) -> Result<Vec<Entity>> {
    self
      .select_entities(
        format!(
          "SELECT {ENTITY_COLUMNS} FROM entities WHERE value = ?
           ORDER BY created_at ASC, rowid ASC LIMIT ?"
        ),
        vec![Value::Text(value.to_owned()), sql_limit(Some(limit))],
      )
      .await
  }

  async fn search_entities<'a>(&'a self, needle: &'a str, limit: usize) -> Result<Vec<Entity>> {
    // instr() is byte-exact; LIKE would fold ASCII case.
    self
      .select_entities(
        format!(
          "SELECT {ENTITY_COLUMNS} FROM entities WHERE instr(value, ?) > 0
           ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ),
        vec![Value::Text(needle.to_owned()), sql_limit(Some(limit))],
      )
      .await
  }

  async fn get_statistics(&self) -> Result<StoreStatistics> {
    let stats = self
      .conn
      .call(|conn| {
        let triple_count: i64 =
          conn.query_row("SELECT COUNT(*) FROM triples", [], |r| r.get(0))?;
        let entity_count: i64 =
          conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))?;

        let grouped = |sql: &str| -> rusqlite::Result<Vec<(String, i64)>> {
          let mut stmt = conn.prepare(sql)?;
          stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect()
        };
        let entity_types =
          grouped("SELECT type, COUNT(*) FROM entities GROUP BY type")?;
        let predicates =
          grouped("SELECT predicate, COUNT(*) FROM triples GROUP BY predicate")?;

        Ok(StoreStatistics {
          triple_count: triple_count as u64,
          entity_count: entity_count as u64,
          entity_types: entity_types.into_iter().map(|(k, n)| (k, n as u64)).collect(),
          predicates:   predicates.into_iter().map(|(k, n)| (k, n as u64)).collect(),
        })
      })
      .await?;

    Ok(stats)
  }
}
