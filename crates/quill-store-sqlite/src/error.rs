//! Error type for `quill-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// The stored body of a document is not a JSON object.
  #[error("document {0} does not hold a JSON object")]
  NotAnObject(String),

  #[error("document not found: {collection}/{id}")]
  DocumentNotFound { collection: String, id: String },

  #[error("blob not found: {0}")]
  BlobNotFound(String),

  #[error("blob already exists: {0}")]
  BlobExists(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
