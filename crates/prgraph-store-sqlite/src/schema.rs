//! SQL schema for the prgraph SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! layout revision.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS entities (
    entity_id     TEXT PRIMARY KEY,
    type          TEXT NOT NULL,
    value         TEXT NOT NULL,
    metadata      TEXT,            -- JSON or NULL
    first_seen_in TEXT,
    created_at    TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    UNIQUE (type, value)
);

-- Triples are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS triples (
    triple_id   TEXT PRIMARY KEY,
    subject     TEXT NOT NULL,
    predicate   TEXT NOT NULL,
    object      TEXT NOT NULL,
    confidence  REAL NOT NULL DEFAULT 1.0
                CHECK (confidence >= 0.0 AND confidence <= 1.0),
    source_type TEXT,
    source_id   TEXT,
    created_at  TEXT NOT NULL,
    UNIQUE (subject, predicate, object)
);

CREATE INDEX IF NOT EXISTS triples_subject_idx   ON triples(subject);
CREATE INDEX IF NOT EXISTS triples_predicate_idx ON triples(predicate);
CREATE INDEX IF NOT EXISTS triples_object_idx    ON triples(object);
CREATE INDEX IF NOT EXISTS entities_type_idx     ON entities(type);
CREATE INDEX IF NOT EXISTS entities_value_idx    ON entities(value);

PRAGMA user_version = 1;
";
