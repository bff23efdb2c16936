//! The `DocumentStore` and `BlobStore` traits and their supporting types.
//!
//! Both are implemented by storage backends (e.g. `quill-store-sqlite`) or by
//! test fakes. The engine depends on these abstractions only; handles are
//! passed in explicitly, never looked up globally.

use std::{fmt, future::Future};

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::{category::Category, record::AssetLocator};

// ─── Paths ───────────────────────────────────────────────────────────────────

/// Address of a document collection, e.g. `stories/abc/characters`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
  /// The top-level `stories` collection.
  pub fn stories() -> Self { Self("stories".into()) }

  /// `stories/{story_id}/{category}`.
  pub fn category(story_id: &str, category: Category) -> Self {
    Self(format!("stories/{story_id}/{category}"))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CollectionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// A document as held by the store: a store-assigned id and a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
  pub id:   String,
  pub body: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
  Ascending,
  #[default]
  Descending,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Abstraction over a key-value document store.
///
/// `update` is a full overwrite, never a field-level patch: any field written
/// by another party since the caller's read is lost.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert a new document and return its store-assigned id.
  fn create(
    &self,
    collection: CollectionPath,
    body: Map<String, Value>,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Fetch a document. Returns `None` if it does not exist.
  fn get(
    &self,
    collection: CollectionPath,
    id: String,
  ) -> impl Future<Output = Result<Option<StoredDocument>, Self::Error>> + Send + '_;

  /// Replace the whole body of an existing document.
  fn update(
    &self,
    collection: CollectionPath,
    id: String,
    body: Map<String, Value>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a document.
  fn delete(
    &self,
    collection: CollectionPath,
    id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Every document of a collection ordered on `order_field`.
  fn list_ordered(
    &self,
    collection: CollectionPath,
    order_field: &'static str,
    direction: SortDirection,
  ) -> impl Future<Output = Result<Vec<StoredDocument>, Self::Error>> + Send + '_;
}

/// Abstraction over a binary object store.
pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `bytes` at `path` and return the locator that addresses it.
  fn put(
    &self,
    path: String,
    bytes: Bytes,
    media_type: String,
  ) -> impl Future<Output = Result<AssetLocator, Self::Error>> + Send + '_;

  /// A URL the presentation layer can load the asset from.
  fn resolve(
    &self,
    locator: AssetLocator,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Remove the asset.
  fn delete(
    &self,
    locator: AssetLocator,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
