//! Story: the root every categorised record hangs off.
//!
//! A story is owned by exactly one user account. Records live in
//! sub-collections `stories/{story_id}/{category}` and refer back to it only
//! by id.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  record::{AssetLocator, ORDER_FIELD, decode_timestamp, encode_timestamp},
  store::StoredDocument,
};

const TITLE_KEY: &str = "title";
const SYNOPSIS_KEY: &str = "synopsis";
const COVER_KEY: &str = "imageUrl";
const OWNER_KEY: &str = "uid";

/// Document key holding the owner identity; used to filter a user's stories.
pub const STORY_OWNER_FIELD: &str = OWNER_KEY;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
  pub id:         String,
  pub title:      String,
  pub synopsis:   Option<String>,
  /// Cover image in the blob store, if one has been uploaded.
  pub cover:      Option<AssetLocator>,
  pub owner:      String,
  pub created_at: Option<DateTime<Utc>>,
}

impl Story {
  pub fn to_document(&self) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert(TITLE_KEY.into(), Value::String(self.title.clone()));
    body.insert(
      SYNOPSIS_KEY.into(),
      self.synopsis.clone().map(Value::String).unwrap_or(Value::Null),
    );
    body.insert(
      COVER_KEY.into(),
      self
        .cover
        .as_ref()
        .map(|c| Value::String(c.as_str().to_owned()))
        .unwrap_or(Value::Null),
    );
    body.insert(OWNER_KEY.into(), Value::String(self.owner.clone()));
    body.insert(
      ORDER_FIELD.into(),
      self
        .created_at
        .map(|dt| Value::String(encode_timestamp(dt)))
        .unwrap_or(Value::Null),
    );
    body
  }

  pub fn from_document(doc: &StoredDocument) -> Result<Self> {
    let owner = doc
      .body
      .get(OWNER_KEY)
      .and_then(Value::as_str)
      .ok_or_else(|| Error::MalformedDocument {
        id:     doc.id.clone(),
        reason: "story has no owner".into(),
      })?;

    let text = |key: &str| {
      doc
        .body
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
    };

    Ok(Self {
      id:         doc.id.clone(),
      title:      text(TITLE_KEY).unwrap_or_default(),
      synopsis:   text(SYNOPSIS_KEY),
      cover:      text(COVER_KEY).map(AssetLocator::new),
      owner:      owner.to_owned(),
      created_at: decode_timestamp(doc.body.get(ORDER_FIELD)),
    })
  }

  /// Heading for lists; stories saved before titles were enforced may have
  /// none.
  pub fn display_title(&self) -> &str {
    if self.title.trim().is_empty() { "Untitled Story" } else { &self.title }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn story_without_owner_is_malformed() {
    let doc = StoredDocument {
      id:   "s1".into(),
      body: json!({ "title": "Orphan" }).as_object().cloned().unwrap(),
    };
    assert!(matches!(
      Story::from_document(&doc),
      Err(Error::MalformedDocument { .. })
    ));
  }

  #[test]
  fn blank_optional_fields_read_as_none() {
    let doc = StoredDocument {
      id:   "s1".into(),
      body: json!({ "title": "", "synopsis": "  ", "imageUrl": null, "uid": "u1" })
        .as_object()
        .cloned()
        .unwrap(),
    };
    let story = Story::from_document(&doc).unwrap();
    assert_eq!(story.synopsis, None);
    assert_eq!(story.cover, None);
    assert_eq!(story.display_title(), "Untitled Story");
  }
}
