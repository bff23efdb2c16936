//! Error type for `quill-engine`.
//!
//! Asset-deletion failures never appear here: cleanup is best effort and is
//! reported through [`AssetCleanup`](crate::assets::AssetCleanup) instead.

use std::time::Duration;

use quill_core::ValidationError;
use thiserror::Error;

use crate::editor::EditorState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Blocks the save; the draft is kept for the user to correct.
  #[error("{0}")]
  Validation(#[from] ValidationError),

  /// The chosen file could not be decoded, resized or re-encoded.
  #[error("image could not be processed: {0}")]
  AssetResize(String),

  #[error("image upload failed: {0}")]
  AssetUpload(#[source] BoxError),

  #[error("image upload timed out after {0:?}")]
  AssetUploadTimeout(Duration),

  #[error("failed to read from the document store: {0}")]
  RecordRead(#[source] BoxError),

  #[error("failed to write record: {0}")]
  RecordWrite(#[source] BoxError),

  #[error("failed to delete record: {0}")]
  RecordDelete(#[source] BoxError),

  #[error("record not found: {0}")]
  RecordNotFound(String),

  #[error("story not found: {0}")]
  StoryNotFound(String),

  /// The stored record moved on since the draft was taken from it.
  #[error("record was changed elsewhere (stored version {stored}, edited version {base})")]
  Conflict { stored: u64, base: u64 },

  /// A save or delete is already in flight for this editor.
  #[error("another save or delete is still in progress")]
  Busy,

  #[error("cannot {action} while the editor is {state:?}")]
  InvalidTransition { action: &'static str, state: EditorState },

  #[error(transparent)]
  Core(#[from] quill_core::Error),
}

impl Error {
  /// Upload failures of either kind; the caller may retry the save.
  pub fn is_asset_upload(&self) -> bool {
    matches!(self, Self::AssetUpload(_) | Self::AssetUploadTimeout(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
