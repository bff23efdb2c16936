//! Entity editor: view, edit and delete one record through a confirmation
//! gate.
//!
//! # State machine
//!
//! ```text
//!           begin_edit               confirm(Save) ok
//! Viewing ─────────────▶ Editing ──────▶ Saving ──────▶ Viewing
//!    │                    │  ▲              │ err
//!    │ confirm(Delete)    │  └──────────────┘
//!    ▼                    │ confirm(Cancel)
//! Deleting ──▶ Closed     └──────────────▶ Viewing (or Closed in create mode)
//! ```
//!
//! Every destructive step (saving over a stored record, discarding a dirty
//! draft, deleting) first parks a [`PendingAction`] and only runs on
//! [`EntityEditor::confirm`]. [`EntityEditor::dismiss`] clears the pending
//! action and changes nothing else.
//!
//! The editor lock is never held across store I/O. While a save or delete is
//! in flight, any other request fails with [`Error::Busy`].

use std::{collections::BTreeMap, sync::Arc};

use chrono::{SubsecRound as _, Utc};
use quill_core::{
  BlobStore, Category, CategoryRecord, CollectionPath, DocumentStore, FieldValue,
  Fields, ImageRef, ValidationError,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
  Error, Result,
  assets::{AssetCleanup, AssetManager, SourceFile, StagedAsset},
  detail::DetailView,
};

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
  Viewing,
  Editing,
  Saving,
  Deleting,
  /// The record was deleted or a new draft was abandoned.
  Closed,
}

impl EditorState {
  fn is_busy(self) -> bool { matches!(self, Self::Saving | Self::Deleting) }
}

/// An action waiting on user confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
  Save,
  Cancel,
  Delete,
}

/// What a request led to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  /// Nothing happened yet; call [`EntityEditor::confirm`] or
  /// [`EntityEditor::dismiss`].
  AwaitingConfirmation(PendingAction),
  Saved(CategoryRecord),
  /// The draft was thrown away.
  Discarded,
  Deleted(DeleteReport),
  Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
  pub record_id: String,
  /// Image cleanup is best effort; a failure here did not stop the delete.
  pub asset:     AssetCleanup,
}

// ─── Draft ───────────────────────────────────────────────────────────────────

/// Raw form input for every schema field plus the image slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
  category: Category,
  values:   BTreeMap<&'static str, String>,
  image:    ImageRef,
}

impl Draft {
  pub fn empty(category: Category) -> Self {
    Self {
      category,
      values: category.fields().iter().map(|f| (f.name, String::new())).collect(),
      image: ImageRef::Placeholder,
    }
  }

  pub fn from_record(record: &CategoryRecord) -> Self {
    Self {
      category: record.category,
      values:   record
        .fields
        .iter()
        .map(|(spec, value)| (spec.name, value.to_input()))
        .collect(),
      image:    record.image.clone(),
    }
  }

  pub fn category(&self) -> Category { self.category }

  pub fn value(&self, name: &str) -> Option<&str> {
    self.values.get(name).map(String::as_str)
  }

  pub fn image(&self) -> &ImageRef { &self.image }

  fn set(&mut self, name: &str, input: &str) -> Result<()> {
    match self.values.get_mut(name) {
      Some(slot) => {
        input.clone_into(slot);
        Ok(())
      }
      None => Err(
        quill_core::Error::UnknownField {
          category: self.category,
          field:    name.to_owned(),
        }
        .into(),
      ),
    }
  }

  /// Parse every field. The distinguishing field must be non-blank.
  ///
  /// A field whose input still matches `stored` keeps the stored value, so a
  /// legacy value that no longer parses survives edits to other fields.
  pub fn validate(&self, stored: Option<&Fields>) -> Result<Fields> {
    let mut fields = Fields::new(self.category);
    for spec in self.category.fields() {
      let input = self.value(spec.name).unwrap_or_default();
      if spec.required && input.trim().is_empty() {
        return Err(
          ValidationError::MissingRequired { field: spec.name, label: spec.label }.into(),
        );
      }
      let unchanged = stored
        .and_then(|stored| stored.get(spec.name))
        .filter(|value| value.to_input() == input);
      let value = match unchanged {
        Some(value) => value.clone(),
        None => FieldValue::parse(spec, input)?,
      };
      fields.set(spec.name, value)?;
    }
    Ok(fields)
  }
}

// ─── Editor ──────────────────────────────────────────────────────────────────

struct Inner {
  state:      EditorState,
  pending:    Option<PendingAction>,
  /// `None` in create mode until the first save.
  stored:     Option<CategoryRecord>,
  draft:      Draft,
  staged:     Option<StagedAsset>,
  last_error: Option<String>,
}

impl Inner {
  fn baseline(&self) -> Draft {
    match &self.stored {
      Some(record) => Draft::from_record(record),
      None => Draft::empty(self.draft.category),
    }
  }

  fn is_dirty(&self) -> bool { self.staged.is_some() || self.draft != self.baseline() }

  fn validate(&mut self) -> Result<Fields> {
    let result = self.draft.validate(self.stored.as_ref().map(|record| &record.fields));
    if let Err(e) = &result {
      self.last_error = Some(e.to_string());
    }
    result
  }

  /// Validate the draft and enter `Saving`.
  fn start_save(&mut self) -> Result<SaveJob> {
    let fields = self.validate()?;
    self.state = EditorState::Saving;
    self.last_error = None;
    Ok(SaveJob {
      fields,
      image: self.draft.image.clone(),
      staged: self.staged.clone(),
      stored: self.stored.clone(),
    })
  }

  /// Enter `Deleting`, returning the record to delete.
  fn start_delete(&mut self) -> Result<CategoryRecord> {
    let Some(record) = self.stored.clone() else {
      return Err(Error::InvalidTransition { action: "delete", state: self.state });
    };
    self.state = EditorState::Deleting;
    Ok(record)
  }

  /// Fails with `Busy` during I/O, otherwise requires `expected` and no
  /// outstanding confirmation.
  fn require(&self, action: &'static str, expected: EditorState) -> Result<()> {
    if self.state.is_busy() {
      return Err(Error::Busy);
    }
    if self.state != expected || self.pending.is_some() {
      return Err(Error::InvalidTransition { action, state: self.state });
    }
    Ok(())
  }

  fn discard(&mut self) {
    self.draft = self.baseline();
    self.staged = None;
    self.pending = None;
    self.last_error = None;
    self.state = if self.stored.is_some() { EditorState::Viewing } else { EditorState::Closed };
  }
}

/// Everything a save needs, captured when the editor enters `Saving`.
struct SaveJob {
  fields: Fields,
  image:  ImageRef,
  staged: Option<StagedAsset>,
  stored: Option<CategoryRecord>,
}

/// Editor for one record of one category in one story.
pub struct EntityEditor<D, B> {
  docs:     Arc<D>,
  assets:   Arc<AssetManager<B>>,
  story_id: String,
  category: Category,
  inner:    Mutex<Inner>,
}

impl<D: DocumentStore, B: BlobStore> EntityEditor<D, B> {
  /// Load `record_id` for viewing. `None` if it does not exist.
  pub async fn open(
    docs: Arc<D>,
    assets: Arc<AssetManager<B>>,
    story_id: &str,
    category: Category,
    record_id: &str,
  ) -> Result<Option<Self>> {
    let doc = docs
      .get(CollectionPath::category(story_id, category), record_id.to_owned())
      .await
      .map_err(|e| Error::RecordRead(Box::new(e)))?;
    let Some(doc) = doc else {
      return Ok(None);
    };
    let record = CategoryRecord::from_document(story_id, category, &doc)?;
    Ok(Some(Self::with_record(docs, assets, record)))
  }

  /// View an already-loaded record.
  pub fn with_record(docs: Arc<D>, assets: Arc<AssetManager<B>>, record: CategoryRecord) -> Self {
    let inner = Inner {
      state:      EditorState::Viewing,
      pending:    None,
      draft:      Draft::from_record(&record),
      stored:     Some(record.clone()),
      staged:     None,
      last_error: None,
    };
    Self {
      docs,
      assets,
      story_id: record.story_id,
      category: record.category,
      inner: Mutex::new(inner),
    }
  }

  /// Start a new, unsaved record in `Editing`.
  pub fn create(
    docs: Arc<D>,
    assets: Arc<AssetManager<B>>,
    story_id: &str,
    category: Category,
  ) -> Self {
    Self {
      docs,
      assets,
      story_id: story_id.to_owned(),
      category,
      inner: Mutex::new(Inner {
        state:      EditorState::Editing,
        pending:    None,
        stored:     None,
        draft:      Draft::empty(category),
        staged:     None,
        last_error: None,
      }),
    }
  }

  // ── Accessors ──

  pub fn category(&self) -> Category { self.category }

  pub fn story_id(&self) -> &str { &self.story_id }

  pub async fn state(&self) -> EditorState { self.inner.lock().await.state }

  pub async fn pending(&self) -> Option<PendingAction> { self.inner.lock().await.pending }

  pub async fn draft(&self) -> Draft { self.inner.lock().await.draft.clone() }

  pub async fn stored(&self) -> Option<CategoryRecord> { self.inner.lock().await.stored.clone() }

  /// Message of the last failed save or image choice, for display.
  pub async fn last_error(&self) -> Option<String> { self.inner.lock().await.last_error.clone() }

  pub async fn is_dirty(&self) -> bool { self.inner.lock().await.is_dirty() }

  /// The stored record as displayed. `None` before a new record's first save.
  pub async fn detail(&self) -> Option<DetailView> {
    self.inner.lock().await.stored.as_ref().map(DetailView::of)
  }

  /// The draft as it would display, including any staged image.
  pub async fn preview(&self) -> DetailView {
    let inner = self.inner.lock().await;
    DetailView::of_draft(&inner.draft, inner.staged.as_ref().map(StagedAsset::preview))
  }

  // ── Editing ──

  pub async fn begin_edit(&self) -> Result<()> {
    let mut inner = self.inner.lock().await;
    inner.require("edit", EditorState::Viewing)?;
    inner.state = EditorState::Editing;
    inner.last_error = None;
    Ok(())
  }

  pub async fn set_field(&self, name: &str, input: &str) -> Result<()> {
    let mut inner = self.inner.lock().await;
    inner.require("change a field", EditorState::Editing)?;
    inner.draft.set(name, input)
  }

  /// Stage `file` as the draft's image. Nothing is uploaded until save.
  pub async fn choose_image(&self, file: SourceFile) -> Result<()> {
    self.inner.lock().await.require("choose an image", EditorState::Editing)?;

    let staged = self.assets.stage(file).await;

    let mut inner = self.inner.lock().await;
    inner.require("choose an image", EditorState::Editing)?;
    match staged {
      Ok(staged) => {
        inner.staged = Some(staged);
        inner.last_error = None;
        Ok(())
      }
      Err(e) => {
        inner.last_error = Some(e.to_string());
        Err(e)
      }
    }
  }

  /// Revert the draft's image to the placeholder. The stored asset is
  /// removed only once the save goes through.
  pub async fn remove_image(&self) -> Result<()> {
    let mut inner = self.inner.lock().await;
    inner.require("remove the image", EditorState::Editing)?;
    inner.staged = None;
    inner.draft.image = ImageRef::Placeholder;
    Ok(())
  }

  // ── Gated requests ──

  /// Ask to save. Overwriting a stored record waits for confirmation; the
  /// first save of a new record runs straight away.
  pub async fn request_save(&self) -> Result<Outcome> {
    let job = {
      let mut inner = self.inner.lock().await;
      inner.require("save", EditorState::Editing)?;
      if inner.stored.is_some() {
        inner.validate()?;
        inner.pending = Some(PendingAction::Save);
        return Ok(Outcome::AwaitingConfirmation(PendingAction::Save));
      }
      inner.start_save()?
    };
    self.perform_save(job).await
  }

  /// Ask to leave edit mode. A clean draft is left without asking.
  pub async fn request_cancel(&self) -> Result<Outcome> {
    let mut inner = self.inner.lock().await;
    inner.require("cancel", EditorState::Editing)?;
    if inner.is_dirty() {
      inner.pending = Some(PendingAction::Cancel);
      return Ok(Outcome::AwaitingConfirmation(PendingAction::Cancel));
    }
    inner.discard();
    Ok(Outcome::Discarded)
  }

  pub async fn request_delete(&self) -> Result<Outcome> {
    let mut inner = self.inner.lock().await;
    inner.require("delete", EditorState::Viewing)?;
    inner.pending = Some(PendingAction::Delete);
    Ok(Outcome::AwaitingConfirmation(PendingAction::Delete))
  }

  /// Run the pending action. The draft that was confirmed is the draft that
  /// gets written: the editor leaves `Editing` before the lock is released.
  pub async fn confirm(&self) -> Result<Outcome> {
    enum Job {
      Save(SaveJob),
      Delete(CategoryRecord),
    }

    let job = {
      let mut inner = self.inner.lock().await;
      if inner.state.is_busy() {
        return Err(Error::Busy);
      }
      let Some(action) = inner.pending.take() else {
        return Err(Error::InvalidTransition { action: "confirm", state: inner.state });
      };
      match action {
        PendingAction::Cancel => {
          inner.discard();
          info!(category = %self.category, "draft discarded");
          return Ok(Outcome::Discarded);
        }
        PendingAction::Save => Job::Save(inner.start_save()?),
        PendingAction::Delete => Job::Delete(inner.start_delete()?),
      }
    };

    match job {
      Job::Save(job) => self.perform_save(job).await,
      Job::Delete(record) => self.perform_delete(record).await,
    }
  }

  /// Drop the pending action. State and draft are untouched.
  pub async fn dismiss(&self) -> Outcome {
    self.inner.lock().await.pending = None;
    Outcome::Dismissed
  }

  // ── Save ──

  async fn perform_save(&self, job: SaveJob) -> Result<Outcome> {
    let SaveJob { fields, image, staged, stored } = job;
    let result = self.write(fields, image, staged, stored.as_ref()).await;

    let mut inner = self.inner.lock().await;
    match result {
      Ok(record) => {
        inner.draft = Draft::from_record(&record);
        inner.stored = Some(record.clone());
        inner.staged = None;
        inner.state = EditorState::Viewing;
        Ok(Outcome::Saved(record))
      }
      Err(e) => {
        warn!(category = %self.category, error = %e, "save failed; draft kept");
        inner.state = EditorState::Editing;
        inner.last_error = Some(e.to_string());
        Err(e)
      }
    }
  }

  /// Commit any staged image, then write the record. The record is never
  /// touched if the commit fails, and a committed image is removed again if
  /// the record write fails.
  async fn write(
    &self,
    fields: Fields,
    image: ImageRef,
    staged: Option<StagedAsset>,
    stored: Option<&CategoryRecord>,
  ) -> Result<CategoryRecord> {
    if stored.is_none() {
      self.ensure_story().await?;
    }

    let committed = match &staged {
      Some(staged) => Some(self.assets.commit(self.category, &self.story_id, staged).await?),
      None => None,
    };
    let image = committed.clone().map(ImageRef::Asset).unwrap_or(image);

    let written = match stored {
      Some(previous) => self.overwrite(previous, fields, image).await,
      None => self.insert(fields, image).await,
    };

    match written {
      Ok(record) => {
        if let Some(previous) = stored
          && let Some(old) = previous.image.asset()
          && record.image.asset() != Some(old)
        {
          self.assets.remove(old).await;
        }
        Ok(record)
      }
      Err(e) => {
        if let Some(orphan) = committed {
          self.assets.remove(&orphan).await;
        }
        Err(e)
      }
    }
  }

  async fn ensure_story(&self) -> Result<()> {
    let story = self
      .docs
      .get(CollectionPath::stories(), self.story_id.clone())
      .await
      .map_err(|e| Error::RecordRead(Box::new(e)))?;
    match story {
      Some(_) => Ok(()),
      None => Err(Error::StoryNotFound(self.story_id.clone())),
    }
  }

  async fn insert(&self, fields: Fields, image: ImageRef) -> Result<CategoryRecord> {
    let mut record = CategoryRecord {
      id: String::new(),
      story_id: self.story_id.clone(),
      category: self.category,
      fields,
      image,
      created_at: Some(Utc::now().trunc_subsecs(6)),
      version: 1,
    };
    record.id = self
      .docs
      .create(self.collection(), record.to_document())
      .await
      .map_err(|e| Error::RecordWrite(Box::new(e)))?;

    info!(category = %self.category, id = %record.id, story = %self.story_id, "record created");
    Ok(record)
  }

  /// Full overwrite, guarded by the version the draft was taken from.
  async fn overwrite(
    &self,
    previous: &CategoryRecord,
    fields: Fields,
    image: ImageRef,
  ) -> Result<CategoryRecord> {
    let current = self
      .docs
      .get(self.collection(), previous.id.clone())
      .await
      .map_err(|e| Error::RecordRead(Box::new(e)))?
      .ok_or_else(|| Error::RecordNotFound(previous.id.clone()))?;
    let current = CategoryRecord::from_document(&self.story_id, self.category, &current)?;
    if current.version != previous.version {
      return Err(Error::Conflict { stored: current.version, base: previous.version });
    }

    let record = CategoryRecord {
      fields,
      image,
      version: previous.version + 1,
      ..previous.clone()
    };
    self
      .docs
      .update(self.collection(), record.id.clone(), record.to_document())
      .await
      .map_err(|e| Error::RecordWrite(Box::new(e)))?;

    info!(category = %self.category, id = %record.id, version = record.version, "record saved");
    Ok(record)
  }

  // ── Delete ──

  async fn perform_delete(&self, record: CategoryRecord) -> Result<Outcome> {
    let asset = self.assets.remove_image(&record.image).await;
    let result = self.docs.delete(self.collection(), record.id.clone()).await;

    let mut inner = self.inner.lock().await;
    match result {
      Ok(()) => {
        inner.state = EditorState::Closed;
        info!(category = %self.category, id = %record.id, ?asset, "record deleted");
        Ok(Outcome::Deleted(DeleteReport { record_id: record.id, asset }))
      }
      Err(e) => {
        let e = Error::RecordDelete(Box::new(e));
        warn!(category = %self.category, id = %record.id, error = %e, "delete failed");
        inner.state = EditorState::Viewing;
        inner.last_error = Some(e.to_string());
        Err(e)
      }
    }
  }

  fn collection(&self) -> CollectionPath { CollectionPath::category(&self.story_id, self.category) }
}
