//! Category list service: all records of one category within a story,
//! newest first.

use std::{cmp::Ordering, sync::Arc};

use quill_core::{
  Category, CategoryRecord, CollectionPath, DocumentStore, SortDirection,
  record::ORDER_FIELD,
};
use tracing::warn;

use crate::{Error, Result};

pub struct CategoryList<D> {
  docs: Arc<D>,
}

impl<D: DocumentStore> CategoryList<D> {
  pub fn new(docs: Arc<D>) -> Self { Self { docs } }

  /// Every record of `category` in `story_id`, ordered by creation time
  /// descending. Documents that cannot be decoded are skipped.
  pub async fn list(&self, story_id: &str, category: Category) -> Result<Vec<CategoryRecord>> {
    let docs = self
      .docs
      .list_ordered(
        CollectionPath::category(story_id, category),
        ORDER_FIELD,
        SortDirection::Descending,
      )
      .await
      .map_err(|e| Error::RecordRead(Box::new(e)))?;

    let mut records: Vec<_> = docs
      .iter()
      .filter_map(|doc| match CategoryRecord::from_document(story_id, category, doc) {
        Ok(record) => Some(record),
        Err(e) => {
          warn!(%category, id = %doc.id, error = %e, "skipping malformed record");
          None
        }
      })
      .collect();

    // Stores agree on the primary key but not on tie-breaks.
    sort_newest_first(&mut records);
    Ok(records)
  }

  /// One record, or `None` if it does not exist.
  pub async fn get(
    &self,
    story_id: &str,
    category: Category,
    id: &str,
  ) -> Result<Option<CategoryRecord>> {
    let doc = self
      .docs
      .get(CollectionPath::category(story_id, category), id.to_owned())
      .await
      .map_err(|e| Error::RecordRead(Box::new(e)))?;
    doc
      .map(|doc| CategoryRecord::from_document(story_id, category, &doc))
      .transpose()
      .map_err(Error::from)
  }
}

/// Newest first; ties broken by id ascending; records without a creation
/// time last.
pub fn sort_newest_first(records: &mut [CategoryRecord]) {
  records.sort_by(|a, b| {
    let by_time = match (a.created_at, b.created_at) {
      (Some(x), Some(y)) => y.cmp(&x),
      (Some(_), None) => Ordering::Less,
      (None, Some(_)) => Ordering::Greater,
      (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.id.cmp(&b.id))
  });
}
