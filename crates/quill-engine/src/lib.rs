//! The Quill category content engine.
//!
//! One schema-driven mechanism handles create, list, view, edit and delete
//! for every [`Category`](quill_core::Category), together with the single
//! image each record may carry. Storage is reached only through the
//! [`DocumentStore`](quill_core::DocumentStore) and
//! [`BlobStore`](quill_core::BlobStore) handles passed in by the caller.

pub mod assets;
pub mod config;
pub mod detail;
pub mod editor;
pub mod error;
pub mod list;
pub mod stories;

pub use assets::{AssetCleanup, AssetManager, SourceFile, StagedAsset};
pub use config::EngineConfig;
pub use detail::{DetailView, DisplayField};
pub use editor::{DeleteReport, Draft, EditorState, EntityEditor, Outcome, PendingAction};
pub use error::{Error, Result};
pub use list::CategoryList;
pub use stories::StoryService;

#[cfg(test)]
mod tests;
