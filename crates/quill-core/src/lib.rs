//! Core types and trait definitions for the Quill story engine.
//!
//! This crate is deliberately free of database, blob-storage and image
//! dependencies. Every other crate depends on it; it performs no I/O.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod category;
pub mod error;
pub mod record;
pub mod store;
pub mod story;

pub use category::{Category, FieldKind, FieldSpec};
pub use error::{Error, Result, ValidationError};
pub use record::{AssetLocator, CategoryRecord, FieldValue, Fields, ImageRef};
pub use store::{BlobStore, CollectionPath, DocumentStore, SortDirection, StoredDocument};
pub use story::Story;
