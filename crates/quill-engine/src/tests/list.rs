use quill_core::Category;
use serde_json::json;

use super::fakes::{Harness, STORY};
use crate::CategoryList;

#[tokio::test]
async fn records_are_listed_newest_first_with_undated_last() {
  let h = Harness::new();
  h.seed(Category::Locations, "old", json!({ "title": "Harbour", "createdAt": "2024-01-01T00:00:00.000000Z" }));
  h.seed(Category::Locations, "legacy", json!({ "title": "Old mill" }));
  h.seed(Category::Locations, "new-b", json!({ "title": "Tower", "createdAt": "2024-06-01T00:00:00.000000Z" }));
  h.seed(Category::Locations, "new-a", json!({ "title": "Gate", "createdAt": "2024-06-01T00:00:00.000000Z" }));

  let list = CategoryList::new(h.docs.clone());
  let records = list.list(STORY, Category::Locations).await.unwrap();

  let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
  assert_eq!(ids, ["new-a", "new-b", "old", "legacy"]);
}

#[tokio::test]
async fn malformed_records_are_skipped() {
  let h = Harness::new();
  h.seed(Category::Events, "ok", json!({ "title": "Coronation", "version": 3 }));
  h.seed(Category::Events, "bad", json!({ "title": "Flood", "version": "three" }));

  let records = CategoryList::new(h.docs.clone()).list(STORY, Category::Events).await.unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].title(), "Coronation");
}

#[tokio::test]
async fn lists_are_scoped_to_story_and_category() {
  let h = Harness::new();
  h.seed(Category::Notes, "n1", json!({ "title": "Themes" }));

  let list = CategoryList::new(h.docs.clone());
  assert!(list.list(STORY, Category::Plots).await.unwrap().is_empty());
  assert!(list.list("other-story", Category::Notes).await.unwrap().is_empty());
  assert_eq!(list.list(STORY, Category::Notes).await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_decodes_or_returns_none() {
  let h = Harness::new();
  h.seed(Category::Gallery, "g1", json!({ "title": "Sketch", "caption": "No caption..." }));

  let list = CategoryList::new(h.docs.clone());
  let record = list.get(STORY, Category::Gallery, "g1").await.unwrap().unwrap();
  assert_eq!(record.title(), "Sketch");
  assert!(record.fields.get("caption").unwrap().is_empty());
  assert!(list.get(STORY, Category::Gallery, "g2").await.unwrap().is_none());
}
