//! SQL schema for the Quill SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Schemaless JSON documents addressed by (collection path, id).
CREATE TABLE IF NOT EXISTS documents (
    collection  TEXT NOT NULL,     -- e.g. 'stories/{story_id}/characters'
    doc_id      TEXT NOT NULL,
    body        TEXT NOT NULL,     -- JSON object
    PRIMARY KEY (collection, doc_id)
);

-- Image binaries. Paths are chosen by the caller and never reused.
CREATE TABLE IF NOT EXISTS blobs (
    path         TEXT PRIMARY KEY, -- '{category}/{story_id}/{unique name}'
    media_type   TEXT NOT NULL,
    bytes        BLOB NOT NULL,
    content_hash TEXT NOT NULL,    -- SHA-256 hex
    created_at   TEXT NOT NULL     -- ISO 8601 UTC
);

CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents(collection);

PRAGMA user_version = 1;
";
