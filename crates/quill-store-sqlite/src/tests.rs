//! Integration tests for `SqliteStore` against an in-memory database.

use bytes::Bytes;
use quill_core::{
  AssetLocator, BlobStore, Category, CollectionPath, DocumentStore,
  SortDirection,
};
use serde_json::{Map, Value, json};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn body(value: Value) -> Map<String, Value> {
  value.as_object().cloned().expect("object literal")
}

fn characters() -> CollectionPath {
  CollectionPath::category("story-1", Category::Characters)
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_document() {
  let s = store().await;

  let id = s
    .create(characters(), body(json!({ "name": "Ada", "age": 36 })))
    .await
    .unwrap();

  let doc = s.get(characters(), id.clone()).await.unwrap().unwrap();
  assert_eq!(doc.id, id);
  assert_eq!(doc.body["name"], json!("Ada"));
  assert_eq!(doc.body["age"], json!(36));
}

#[tokio::test]
async fn get_missing_document_returns_none() {
  let s = store().await;
  assert!(s.get(characters(), "nope".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn documents_are_scoped_to_their_collection() {
  let s = store().await;
  let id = s
    .create(characters(), body(json!({ "name": "Ada" })))
    .await
    .unwrap();

  let other_story = CollectionPath::category("story-2", Category::Characters);
  let other_category = CollectionPath::category("story-1", Category::Locations);
  assert!(s.get(other_story, id.clone()).await.unwrap().is_none());
  assert!(s.get(other_category, id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_overwrites_the_whole_body() {
  let s = store().await;
  let id = s
    .create(characters(), body(json!({ "name": "Ada", "gender": "f" })))
    .await
    .unwrap();

  s.update(characters(), id.clone(), body(json!({ "name": "Ada Byron" })))
    .await
    .unwrap();

  let doc = s.get(characters(), id).await.unwrap().unwrap();
  assert_eq!(doc.body["name"], json!("Ada Byron"));
  assert!(!doc.body.contains_key("gender"));
}

#[tokio::test]
async fn update_missing_document_errors() {
  let s = store().await;
  let err = s
    .update(characters(), "ghost".into(), body(json!({})))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DocumentNotFound { id, .. } if id == "ghost"));
}

#[tokio::test]
async fn delete_document() {
  let s = store().await;
  let id = s
    .create(characters(), body(json!({ "name": "Ada" })))
    .await
    .unwrap();

  DocumentStore::delete(&s, characters(), id.clone()).await.unwrap();
  assert!(s.get(characters(), id).await.unwrap().is_none());
}

#[tokio::test]
async fn list_ordered_descending_puts_missing_values_last() {
  let s = store().await;
  let old = s
    .create(characters(), body(json!({ "createdAt": "2024-01-01T00:00:00.000000Z" })))
    .await
    .unwrap();
  let legacy = s
    .create(characters(), body(json!({ "name": "no timestamp" })))
    .await
    .unwrap();
  let new = s
    .create(characters(), body(json!({ "createdAt": "2024-06-01T00:00:00.000000Z" })))
    .await
    .unwrap();

  let docs = s
    .list_ordered(characters(), "createdAt", SortDirection::Descending)
    .await
    .unwrap();
  let ids: Vec<_> = docs.into_iter().map(|d| d.id).collect();
  assert_eq!(ids, [new, old, legacy]);
}

#[tokio::test]
async fn list_ordered_empty_collection() {
  let s = store().await;
  let docs = s
    .list_ordered(characters(), "createdAt", SortDirection::Descending)
    .await
    .unwrap();
  assert!(docs.is_empty());
}

// ─── Blobs ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_resolve_and_read_blob() {
  let s = store().await;
  let locator = s
    .put(
      "gallery/story-1/1-cover.png".into(),
      Bytes::from_static(b"\x89PNG fake"),
      "image/png".into(),
    )
    .await
    .unwrap();

  assert_eq!(locator.as_str(), "gallery/story-1/1-cover.png");
  assert_eq!(
    s.resolve(locator.clone()).await.unwrap(),
    "memory://blobs/gallery/story-1/1-cover.png"
  );

  let (bytes, media_type) = s.read_blob(&locator).await.unwrap();
  assert_eq!(bytes.as_ref(), b"\x89PNG fake");
  assert_eq!(media_type, "image/png");
}

#[tokio::test]
async fn put_existing_path_errors() {
  let s = store().await;
  let path = "notes/story-1/1-a.png".to_owned();
  s.put(path.clone(), Bytes::from_static(b"a"), "image/png".into())
    .await
    .unwrap();

  let err = s
    .put(path, Bytes::from_static(b"b"), "image/png".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BlobExists(_)));
}

#[tokio::test]
async fn delete_blob_twice_reports_not_found() {
  let s = store().await;
  let locator = s
    .put("plots/story-1/1-a.png".into(), Bytes::from_static(b"a"), "image/png".into())
    .await
    .unwrap();

  BlobStore::delete(&s, locator.clone()).await.unwrap();
  let err = BlobStore::delete(&s, locator.clone()).await.unwrap_err();
  assert!(matches!(err, Error::BlobNotFound(_)));
  assert!(matches!(s.resolve(locator).await, Err(Error::BlobNotFound(_))));
}

#[tokio::test]
async fn resolve_unknown_locator_errors() {
  let s = store().await;
  let err = s
    .resolve(AssetLocator::new("events/story-1/missing.png"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BlobNotFound(_)));
}
