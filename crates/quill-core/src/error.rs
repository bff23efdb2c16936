//! Error types for `quill-core`.

use thiserror::Error;

use crate::category::Category;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown category: {0:?}")]
  UnknownCategory(String),

  #[error("{category} has no field named {field:?}")]
  UnknownField { category: Category, field: String },

  #[error("malformed document {id}: {reason}")]
  MalformedDocument { id: String, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Input that blocks a save. Always recoverable in place: the draft is kept
/// and the user fixes the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("{label} is required")]
  MissingRequired { field: &'static str, label: &'static str },

  #[error("{field} must be a number, got {input:?}")]
  InvalidNumber { field: &'static str, input: String },

  #[error("{field} must be a date (YYYY-MM-DD), got {input:?}")]
  InvalidDate { field: &'static str, input: String },
}
