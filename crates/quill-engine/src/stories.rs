//! Story service: the parent documents every category record belongs to.
//!
//! Deleting a story removes only the story document and its cover. Records
//! under `stories/{id}/{category}` are left in place.

use std::sync::Arc;

use chrono::{SubsecRound as _, Utc};
use quill_core::{
  BlobStore, CollectionPath, DocumentStore, SortDirection, Story, ValidationError,
  record::ORDER_FIELD,
};
use tracing::{info, warn};

use crate::{
  Error, Result,
  assets::{AssetCleanup, AssetManager, StagedAsset},
};

pub struct StoryService<D, B> {
  docs:   Arc<D>,
  assets: Arc<AssetManager<B>>,
}

impl<D: DocumentStore, B: BlobStore> StoryService<D, B> {
  pub fn new(docs: Arc<D>, assets: Arc<AssetManager<B>>) -> Self { Self { docs, assets } }

  pub async fn create(&self, owner: &str, title: &str) -> Result<Story> {
    let title = required_title(title)?;
    let mut story = Story {
      id: String::new(),
      title,
      synopsis: None,
      cover: None,
      owner: owner.to_owned(),
      created_at: Some(Utc::now().trunc_subsecs(6)),
    };
    story.id = self
      .docs
      .create(CollectionPath::stories(), story.to_document())
      .await
      .map_err(|e| Error::RecordWrite(Box::new(e)))?;

    info!(id = %story.id, %owner, "story created");
    Ok(story)
  }

  pub async fn get(&self, id: &str) -> Result<Option<Story>> {
    let doc = self
      .docs
      .get(CollectionPath::stories(), id.to_owned())
      .await
      .map_err(|e| Error::RecordRead(Box::new(e)))?;
    Ok(doc.map(|doc| Story::from_document(&doc)).transpose()?)
  }

  /// Stories belonging to `owner`, newest first.
  pub async fn list_for_owner(&self, owner: &str) -> Result<Vec<Story>> {
    let docs = self
      .docs
      .list_ordered(CollectionPath::stories(), ORDER_FIELD, SortDirection::Descending)
      .await
      .map_err(|e| Error::RecordRead(Box::new(e)))?;

    Ok(
      docs
        .iter()
        .filter_map(|doc| match Story::from_document(doc) {
          Ok(story) => Some(story),
          Err(e) => {
            warn!(id = %doc.id, error = %e, "skipping malformed story");
            None
          }
        })
        .filter(|story| story.owner == owner)
        .collect(),
    )
  }

  pub async fn rename(&self, id: &str, title: &str) -> Result<Story> {
    let title = required_title(title)?;
    let story = Story { title, ..self.load(id).await? };
    self.store(&story).await?;
    Ok(story)
  }

  /// Blank input clears the synopsis.
  pub async fn set_synopsis(&self, id: &str, synopsis: &str) -> Result<Story> {
    let synopsis = Some(synopsis.trim())
      .filter(|s| !s.is_empty())
      .map(str::to_owned);
    let story = Story { synopsis, ..self.load(id).await? };
    self.store(&story).await?;
    Ok(story)
  }

  /// Replace the cover. The previous cover is removed once the story points
  /// at the new one.
  pub async fn set_cover(&self, id: &str, staged: &StagedAsset) -> Result<Story> {
    let previous = self.load(id).await?;
    let locator = self.assets.commit_cover(id, staged).await?;
    let story = Story { cover: Some(locator.clone()), ..previous.clone() };

    if let Err(e) = self.store(&story).await {
      self.assets.remove(&locator).await;
      return Err(e);
    }
    if let Some(old) = &previous.cover {
      self.assets.remove(old).await;
    }
    Ok(story)
  }

  pub async fn remove_cover(&self, id: &str) -> Result<(Story, AssetCleanup)> {
    let previous = self.load(id).await?;
    let story = Story { cover: None, ..previous.clone() };
    self.store(&story).await?;
    let cleanup = match &previous.cover {
      Some(old) => self.assets.remove(old).await,
      None => AssetCleanup::Skipped,
    };
    Ok((story, cleanup))
  }

  /// Delete the story document and its cover.
  pub async fn delete(&self, id: &str) -> Result<AssetCleanup> {
    let story = self.load(id).await?;
    let cleanup = match &story.cover {
      Some(cover) => self.assets.remove(cover).await,
      None => AssetCleanup::Skipped,
    };
    self
      .docs
      .delete(CollectionPath::stories(), id.to_owned())
      .await
      .map_err(|e| Error::RecordDelete(Box::new(e)))?;

    info!(%id, "story deleted; its records are kept");
    Ok(cleanup)
  }

  async fn load(&self, id: &str) -> Result<Story> {
    self.get(id).await?.ok_or_else(|| Error::StoryNotFound(id.to_owned()))
  }

  async fn store(&self, story: &Story) -> Result<()> {
    self
      .docs
      .update(CollectionPath::stories(), story.id.clone(), story.to_document())
      .await
      .map_err(|e| Error::RecordWrite(Box::new(e)))
  }
}

fn required_title(title: &str) -> Result<String> {
  let trimmed = title.trim();
  if trimmed.is_empty() {
    return Err(ValidationError::MissingRequired { field: "title", label: "Title" }.into());
  }
  Ok(trimmed.to_owned())
}
