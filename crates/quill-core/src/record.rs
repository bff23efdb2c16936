//! Category records, the persisted instances of a [`Category`] inside a
//! story, and the codec between them and store documents.
//!
//! A record's field set is always exactly its category's schema. Blank values
//! are stored as `null`; fallback labels exist only at display time.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  category::{Category, FieldKind, FieldSpec},
  error::ValidationError,
  store::StoredDocument,
};

/// Document key holding the image reference.
pub const IMAGE_KEY: &str = "image";
/// Document key holding the creation timestamp; lists are ordered on it.
pub const ORDER_FIELD: &str = "createdAt";
/// Document key holding the optimistic-concurrency counter.
pub const VERSION_KEY: &str = "version";

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Encode a timestamp as fixed-width RFC 3339 UTC so that lexicographic
/// order matches chronological order.
pub fn encode_timestamp(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp; anything unparseable reads as absent.
pub fn decode_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
  value
    .and_then(Value::as_str)
    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    .map(|dt| dt.with_timezone(&Utc))
}

// ─── Assets ──────────────────────────────────────────────────────────────────

/// An opaque key into the blob store (or a bundled placeholder path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetLocator(String);

impl AssetLocator {
  pub fn new(locator: impl Into<String>) -> Self { Self(locator.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The final path segment, i.e. the stored file name.
  pub fn file_name(&self) -> &str {
    self.0.rsplit('/').next().unwrap_or(&self.0)
  }
}

impl fmt::Display for AssetLocator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The `image` slot of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageRef {
  /// No user-supplied image; render the category placeholder.
  #[default]
  Placeholder,
  /// A committed asset in the blob store.
  Asset(AssetLocator),
}

impl ImageRef {
  /// The committed asset, if any. Placeholders have none.
  pub fn asset(&self) -> Option<&AssetLocator> {
    match self {
      Self::Placeholder => None,
      Self::Asset(locator) => Some(locator),
    }
  }

  /// The locator to render: the asset, or the category placeholder.
  pub fn display_locator(&self, category: Category) -> AssetLocator {
    match self {
      Self::Placeholder => category.default_asset(),
      Self::Asset(locator) => locator.clone(),
    }
  }

  fn to_json(&self) -> Value {
    match self {
      Self::Placeholder => Value::Null,
      Self::Asset(locator) => Value::String(locator.as_str().to_owned()),
    }
  }

  /// A stored placeholder path (written by older clients) is read back as
  /// [`ImageRef::Placeholder`].
  fn from_json(category: Category, value: Option<&Value>) -> Self {
    match value.and_then(Value::as_str) {
      Some(s) if !s.trim().is_empty() && !category.is_placeholder(s) => {
        Self::Asset(AssetLocator::new(s))
      }
      _ => Self::Placeholder,
    }
  }
}

// ─── Field values ────────────────────────────────────────────────────────────

/// A single field value of a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
  #[default]
  Empty,
  Text(String),
  Number(f64),
  Date(NaiveDate),
}

static EMPTY: FieldValue = FieldValue::Empty;

impl FieldValue {
  /// Convert raw form input for `spec`. Blank input is always valid and
  /// becomes [`FieldValue::Empty`].
  pub fn parse(spec: &FieldSpec, input: &str) -> Result<Self, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
      return Ok(Self::Empty);
    }
    match spec.kind {
      FieldKind::Text | FieldKind::LongText => Ok(Self::Text(input.to_owned())),
      FieldKind::Number => trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Self::Number)
        .ok_or_else(|| ValidationError::InvalidNumber {
          field: spec.name,
          input: input.to_owned(),
        }),
      FieldKind::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Self::Date)
        .map_err(|_| ValidationError::InvalidDate {
          field: spec.name,
          input: input.to_owned(),
        }),
    }
  }

  pub fn is_empty(&self) -> bool { self.display().is_none() }

  /// The value as it should be shown, or `None` when there is nothing to
  /// show and the caller should use the field's fallback.
  pub fn display(&self) -> Option<String> {
    match self {
      Self::Empty => None,
      Self::Text(s) if s.trim().is_empty() => None,
      Self::Text(s) => Some(s.clone()),
      Self::Number(n) => Some(n.to_string()),
      Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
    }
  }

  /// The value as form input; the inverse of [`FieldValue::parse`].
  pub fn to_input(&self) -> String { self.display().unwrap_or_default() }

  fn to_json(&self) -> Value {
    match self {
      Self::Empty => Value::Null,
      Self::Text(s) => Value::String(s.clone()),
      Self::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
        Value::from(*n as i64)
      }
      Self::Number(n) => serde_json::Number::from_f64(*n)
        .map(Value::Number)
        .unwrap_or(Value::Null),
      Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
    }
  }

  /// Lenient decoding: stored fallback labels read as empty, and strings that
  /// do not fit a typed field are kept as text rather than rejected.
  fn from_json(spec: &FieldSpec, value: Option<&Value>) -> Self {
    match value {
      None | Some(Value::Null) => Self::Empty,
      Some(Value::String(s)) if s.trim().is_empty() || s == spec.fallback => {
        Self::Empty
      }
      Some(Value::String(s)) => match spec.kind {
        FieldKind::Number => s
          .trim()
          .parse::<f64>()
          .ok()
          .filter(|n| n.is_finite())
          .map_or_else(|| Self::Text(s.clone()), Self::Number),
        FieldKind::Date => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
          .map(Self::Date)
          .unwrap_or_else(|_| Self::Text(s.clone())),
        FieldKind::Text | FieldKind::LongText => Self::Text(s.clone()),
      },
      Some(Value::Number(n)) => match (spec.kind, n.as_f64()) {
        (FieldKind::Number, Some(f)) => Self::Number(f),
        _ => Self::Text(n.to_string()),
      },
      Some(other) => Self::Text(other.to_string()),
    }
  }
}

// ─── Fields ──────────────────────────────────────────────────────────────────

/// The schema-shaped field map of a record. Its key set is fixed at
/// construction to the category's schema and can never grow or shrink.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields {
  category: Category,
  values:   BTreeMap<&'static str, FieldValue>,
}

impl Fields {
  /// All fields of `category`, empty.
  pub fn new(category: Category) -> Self {
    let values = category
      .fields()
      .iter()
      .map(|spec| (spec.name, FieldValue::Empty))
      .collect();
    Self { category, values }
  }

  pub fn category(&self) -> Category { self.category }

  pub fn get(&self, name: &str) -> Option<&FieldValue> { self.values.get(name) }

  /// Replace a value. Names outside the schema are rejected.
  pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
    match self.values.get_mut(name) {
      Some(slot) => {
        *slot = value;
        Ok(())
      }
      None => Err(Error::UnknownField {
        category: self.category,
        field:    name.to_owned(),
      }),
    }
  }

  /// Fields in schema order, paired with their specs.
  pub fn iter(&self) -> impl Iterator<Item = (&'static FieldSpec, &FieldValue)> + '_ {
    self
      .category
      .fields()
      .iter()
      .map(|spec| (spec, self.values.get(spec.name).unwrap_or(&EMPTY)))
  }

  /// The displayed value of the distinguishing field, if set.
  pub fn distinguishing(&self) -> Option<String> {
    let spec = self.category.distinguishing_field();
    self.get(spec.name).and_then(FieldValue::display)
  }
}

// ─── CategoryRecord ──────────────────────────────────────────────────────────

/// A persisted instance of a category, scoped to one story.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
  pub id:         String,
  pub story_id:   String,
  pub category:   Category,
  pub fields:     Fields,
  pub image:      ImageRef,
  /// Absent only on legacy records written before ordering existed.
  pub created_at: Option<DateTime<Utc>>,
  /// Incremented on every successful save.
  pub version:    u64,
}

impl CategoryRecord {
  /// The heading shown for this record.
  pub fn title(&self) -> String {
    self.fields.distinguishing().unwrap_or_else(|| "Untitled".to_owned())
  }

  /// Full document body: every schema field plus `image`, `createdAt` and
  /// `version`. Saves overwrite the stored document with exactly this.
  pub fn to_document(&self) -> Map<String, Value> {
    let mut body = Map::new();
    for (spec, value) in self.fields.iter() {
      body.insert(spec.name.to_owned(), value.to_json());
    }
    body.insert(IMAGE_KEY.to_owned(), self.image.to_json());
    body.insert(
      ORDER_FIELD.to_owned(),
      self
        .created_at
        .map(|dt| Value::String(encode_timestamp(dt)))
        .unwrap_or(Value::Null),
    );
    body.insert(VERSION_KEY.to_owned(), Value::from(self.version));
    body
  }

  /// Decode a stored document. Keys outside the schema are ignored and
  /// missing keys read as empty.
  pub fn from_document(
    story_id: &str,
    category: Category,
    doc: &StoredDocument,
  ) -> Result<Self> {
    if doc.id.is_empty() {
      return Err(Error::MalformedDocument {
        id:     doc.id.clone(),
        reason: "empty document id".into(),
      });
    }

    let mut fields = Fields::new(category);
    for spec in category.fields() {
      fields.set(spec.name, FieldValue::from_json(spec, doc.body.get(spec.name)))?;
    }

    let version = match doc.body.get(VERSION_KEY) {
      None | Some(Value::Null) => 0,
      Some(v) => v.as_u64().ok_or_else(|| Error::MalformedDocument {
        id:     doc.id.clone(),
        reason: format!("version is not a non-negative integer: {v}"),
      })?,
    };

    Ok(Self {
      id: doc.id.clone(),
      story_id: story_id.to_owned(),
      category,
      fields,
      image: ImageRef::from_json(category, doc.body.get(IMAGE_KEY)),
      created_at: decode_timestamp(doc.body.get(ORDER_FIELD)),
      version,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  fn doc(body: Value) -> StoredDocument {
    StoredDocument {
      id:   "rec-1".into(),
      body: body.as_object().cloned().unwrap(),
    }
  }

  #[test]
  fn document_carries_exactly_the_schema_fields() {
    let mut fields = Fields::new(Category::Notes);
    fields.set("title", FieldValue::Text("Chapter ideas".into())).unwrap();
    let record = CategoryRecord {
      id: "n1".into(),
      story_id: "s1".into(),
      category: Category::Notes,
      fields,
      image: ImageRef::Placeholder,
      created_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
      version: 3,
    };

    let body = record.to_document();
    let mut keys: Vec<_> = body.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["createdAt", "image", "note", "title", "version"]);
    assert_eq!(body["note"], Value::Null);
    assert_eq!(body["image"], Value::Null);
    assert_eq!(body["createdAt"], json!("2024-05-01T12:00:00.000000Z"));
  }

  #[test]
  fn unknown_field_is_rejected() {
    let mut fields = Fields::new(Category::Gallery);
    let err = fields.set("age", FieldValue::Number(3.0)).unwrap_err();
    assert!(matches!(err, Error::UnknownField { field, .. } if field == "age"));
  }

  #[test]
  fn legacy_fallback_strings_decode_as_empty() {
    let record = CategoryRecord::from_document(
      "s1",
      Category::Characters,
      &doc(json!({
        "name": "Ada",
        "age": "Unknown Age",
        "backstory": "No Backstory Provided",
        "image": "defaults/TheDefaultCharacter.jpg",
        "extra": "ignored",
      })),
    )
    .unwrap();

    assert_eq!(record.fields.get("age"), Some(&FieldValue::Empty));
    assert_eq!(record.fields.get("backstory"), Some(&FieldValue::Empty));
    assert_eq!(record.image, ImageRef::Placeholder);
    assert_eq!(record.created_at, None);
    assert_eq!(record.version, 0);
    assert!(record.fields.get("extra").is_none());
  }

  #[test]
  fn non_numeric_age_is_kept_as_text() {
    let record = CategoryRecord::from_document(
      "s1",
      Category::Characters,
      &doc(json!({ "name": "Ada", "age": "about forty" })),
    )
    .unwrap();
    assert_eq!(
      record.fields.get("age"),
      Some(&FieldValue::Text("about forty".into()))
    );
  }

  #[test]
  fn non_finite_number_strings_are_kept_as_text() {
    let record = CategoryRecord::from_document(
      "s1",
      Category::Characters,
      &doc(json!({ "name": "Ada", "age": "inf" })),
    )
    .unwrap();
    assert_eq!(record.fields.get("age"), Some(&FieldValue::Text("inf".into())));
    assert_eq!(record.to_document().get("age"), Some(&json!("inf")));
  }

  #[test]
  fn parse_rejects_malformed_numbers_and_dates() {
    let age = Category::Characters.field("age").unwrap();
    let birthdate = Category::Characters.field("birthdate").unwrap();

    assert_eq!(FieldValue::parse(age, "  ").unwrap(), FieldValue::Empty);
    assert_eq!(FieldValue::parse(age, "42").unwrap(), FieldValue::Number(42.0));
    assert!(matches!(
      FieldValue::parse(age, "forty"),
      Err(ValidationError::InvalidNumber { field: "age", .. })
    ));
    assert!(matches!(
      FieldValue::parse(birthdate, "1815-13-40"),
      Err(ValidationError::InvalidDate { field: "birthdate", .. })
    ));
  }

  #[test]
  fn integral_numbers_are_stored_as_integers() {
    assert_eq!(FieldValue::Number(42.0).to_json(), json!(42));
    assert_eq!(FieldValue::Number(1.75).to_json(), json!(1.75));
    assert_eq!(FieldValue::Number(42.0).to_input(), "42");
  }
}
