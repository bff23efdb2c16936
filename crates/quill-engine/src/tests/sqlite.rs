//! End to end against the SQLite store.

use std::sync::Arc;

use quill_core::{Category, ImageRef};
use quill_store_sqlite::SqliteStore;

use super::fakes::png;
use crate::{
  AssetCleanup, AssetManager, CategoryList, EngineConfig, EntityEditor, Outcome, StoryService,
};

#[tokio::test]
async fn character_lifecycle_on_sqlite() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let assets = Arc::new(AssetManager::new(store.clone(), EngineConfig::default()));
  let stories = StoryService::new(store.clone(), assets.clone());
  let list = CategoryList::new(store.clone());

  let story = stories.create("user-1", "Lighthouse").await.unwrap();

  let editor = EntityEditor::create(store.clone(), assets.clone(), &story.id, Category::Characters);
  editor.set_field("name", "Keeper").await.unwrap();
  editor.set_field("birthdate", "1850-02-14").await.unwrap();
  editor.choose_image(png(1600, 400)).await.unwrap();
  let Outcome::Saved(record) = editor.request_save().await.unwrap() else {
    panic!("expected save");
  };

  let ImageRef::Asset(locator) = &record.image else {
    panic!("expected an asset");
  };
  let (bytes, media_type) = store.read_blob(locator).await.unwrap();
  assert_eq!(media_type, "image/png");
  let stored = image::load_from_memory(&bytes).unwrap();
  assert_eq!((stored.width(), stored.height()), (1200, 300));
  assert!(assets.resolve(Category::Characters, &record.image).await.starts_with("memory://blobs/"));

  let listed = list.list(&story.id, Category::Characters).await.unwrap();
  assert_eq!(listed, [record.clone()]);

  editor.request_delete().await.unwrap();
  let Outcome::Deleted(report) = editor.confirm().await.unwrap() else {
    panic!("expected delete");
  };
  assert_eq!(report.asset, AssetCleanup::Removed);
  assert!(store.read_blob(locator).await.is_err());
  assert!(list.list(&story.id, Category::Characters).await.unwrap().is_empty());
}
