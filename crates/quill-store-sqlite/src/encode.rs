//! Encoding and decoding helpers between domain values and the plain-text
//! representations stored in SQLite columns.
//!
//! Document bodies are stored as compact JSON objects. Timestamps are
//! RFC 3339 strings. Content hashes are lowercase SHA-256 hex.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

// ─── Document body ───────────────────────────────────────────────────────────

pub fn encode_body(body: &Map<String, Value>) -> Result<String> {
  Ok(serde_json::to_string(body)?)
}

pub fn decode_body(id: &str, raw: &str) -> Result<Map<String, Value>> {
  match serde_json::from_str(raw)? {
    Value::Object(map) => Ok(map),
    _ => Err(Error::NotAnObject(id.to_owned())),
  }
}

/// JSON path for `json_extract`, e.g. `$.createdAt`.
pub fn json_path(field: &str) -> String { format!("$.\"{field}\"") }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

// ─── Blobs ───────────────────────────────────────────────────────────────────

pub fn content_hash(bytes: &[u8]) -> String {
  hex::encode(Sha256::digest(bytes))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub doc_id: String,
  pub body:   String,
}

impl RawDocument {
  pub fn into_document(self) -> Result<quill_core::StoredDocument> {
    let body = decode_body(&self.doc_id, &self.body)?;
    Ok(quill_core::StoredDocument { id: self.doc_id, body })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn non_object_bodies_are_rejected() {
    assert!(matches!(decode_body("d1", "[1,2]"), Err(Error::NotAnObject(id)) if id == "d1"));
    assert!(decode_body("d1", "{\"a\":1}").is_ok());
  }

  #[test]
  fn content_hash_is_sha256_hex() {
    assert_eq!(
      content_hash(b""),
      "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
  }
}
