//! The Schema Registry: the single source of truth for what each category
//! of story content looks like.
//!
//! Create forms, edit forms, the detail view and the document codec all read
//! field lists from here. Adding a category means adding one variant and one
//! schema table below; nothing else in the engine branches on category.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, record::AssetLocator};

// ─── Category ────────────────────────────────────────────────────────────────

/// One of the fixed kinds of content a story is organised into.
///
/// The string form doubles as the collection name under
/// `stories/{story_id}/` and as the first blob-path segment.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
  Characters,
  Locations,
  Plots,
  Events,
  Notes,
  Gallery,
}

impl Category {
  /// Every category, in the order a story overview lists them.
  pub const ALL: [Category; 6] = [
    Self::Characters,
    Self::Locations,
    Self::Plots,
    Self::Events,
    Self::Notes,
    Self::Gallery,
  ];

  /// Parse a collection name, mapping failure onto [`Error::UnknownCategory`].
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownCategory(s.to_owned()))
  }

  /// The ordered field list for this category (`fieldsFor`).
  pub fn fields(self) -> &'static [FieldSpec] {
    match self {
      Self::Characters => CHARACTER_FIELDS,
      Self::Locations | Self::Plots | Self::Events => DESCRIBED_FIELDS,
      Self::Notes => NOTE_FIELDS,
      Self::Gallery => GALLERY_FIELDS,
    }
  }

  /// Look up a single field by name.
  pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
    self.fields().iter().find(|f| f.name == name)
  }

  /// The field that names a record (`name` or `title`). It is always the
  /// first required field of the schema.
  pub fn distinguishing_field(self) -> &'static FieldSpec {
    let fields = self.fields();
    fields.iter().find(|f| f.required).unwrap_or(&fields[0])
  }

  /// The placeholder image shown when a record has no image of its own
  /// (`defaultAssetFor`).
  pub fn default_asset(self) -> AssetLocator {
    AssetLocator::new(self.default_asset_path())
  }

  /// Static form of [`Category::default_asset`], usable for comparisons
  /// without allocating.
  pub fn default_asset_path(self) -> &'static str {
    match self {
      Self::Characters => "defaults/TheDefaultCharacter.jpg",
      Self::Locations => "defaults/TheDefaultLocation.jpg",
      Self::Plots => "defaults/TheDefaultPlot.jpg",
      Self::Events => "defaults/TheDefaultEvent.jpg",
      Self::Notes => "defaults/TheDefaultNotes.jpg",
      Self::Gallery => "defaults/TheDefaultGallery.jpg",
    }
  }

  /// Whether `locator` is this category's placeholder.
  pub fn is_placeholder(self, locator: &str) -> bool {
    locator == self.default_asset_path()
  }

  /// Singular noun for messages, e.g. "character".
  pub fn singular(self) -> &'static str {
    match self {
      Self::Characters => "character",
      Self::Locations => "location",
      Self::Plots => "plot",
      Self::Events => "event",
      Self::Notes => "note",
      Self::Gallery => "gallery item",
    }
  }
}

// ─── Field schema ────────────────────────────────────────────────────────────

/// How a field is entered and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
  /// A single-line string.
  Text,
  /// A multi-line string.
  LongText,
  /// A number; stored as a JSON number.
  Number,
  /// A calendar date; stored as `YYYY-MM-DD`.
  Date,
}

/// One entry of a category schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  /// Document key.
  pub name:     &'static str,
  /// Human-readable label.
  pub label:    &'static str,
  pub kind:     FieldKind,
  /// Must be non-blank before a save may proceed.
  pub required: bool,
  /// Shown in place of an empty value. Never written to storage.
  pub fallback: &'static str,
}

const fn field(
  name: &'static str,
  label: &'static str,
  kind: FieldKind,
  fallback: &'static str,
) -> FieldSpec {
  FieldSpec { name, label, kind, required: false, fallback }
}

const fn required(name: &'static str, label: &'static str) -> FieldSpec {
  FieldSpec {
    name,
    label,
    kind: FieldKind::Text,
    required: true,
    fallback: "Untitled",
  }
}

static CHARACTER_FIELDS: &[FieldSpec] = &[
  required("name", "Name"),
  field("birthdate", "Birthdate", FieldKind::Date, "Unknown Birthdate"),
  field("birthplace", "Birthplace", FieldKind::Text, "Unknown Birthplace"),
  field("age", "Age", FieldKind::Number, "Unknown Age"),
  field("gender", "Gender", FieldKind::Text, "No Gender provided"),
  field("height", "Height", FieldKind::Text, "Unknown Height"),
  field("weight", "Weight", FieldKind::Text, "Unknown Weight"),
  field("appearance", "Appearance", FieldKind::LongText, "No Appearance provided"),
  field("personality", "Personality", FieldKind::LongText, "No Personality provided"),
  field("backstory", "Backstory", FieldKind::LongText, "No Backstory Provided"),
  field("notes", "Notes", FieldKind::LongText, "No Additional Notes"),
];

/// Shared by locations, plots and events.
static DESCRIBED_FIELDS: &[FieldSpec] = &[
  required("title", "Title"),
  field("description", "Description", FieldKind::LongText, "No Description Provided"),
];

static NOTE_FIELDS: &[FieldSpec] = &[
  required("title", "Title"),
  field("note", "Note", FieldKind::LongText, "No Note Content"),
];

static GALLERY_FIELDS: &[FieldSpec] = &[
  required("title", "Title"),
  field("caption", "Caption", FieldKind::Text, "No caption..."),
];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_schema_has_exactly_one_required_field_first() {
    for category in Category::ALL {
      let fields = category.fields();
      assert!(fields[0].required, "{category}");
      assert_eq!(fields.iter().filter(|f| f.required).count(), 1, "{category}");
      assert_eq!(category.distinguishing_field().name, fields[0].name);
    }
  }

  #[test]
  fn field_names_are_unique_within_a_schema() {
    for category in Category::ALL {
      let mut names: Vec<_> = category.fields().iter().map(|f| f.name).collect();
      names.sort_unstable();
      names.dedup();
      assert_eq!(names.len(), category.fields().len(), "{category}");
    }
  }

  #[test]
  fn collection_names_round_trip() {
    for category in Category::ALL {
      assert_eq!(Category::parse(category.as_ref()).unwrap(), category);
    }
    assert_eq!(Category::Gallery.to_string(), "gallery");
    assert!(matches!(
      Category::parse("villains"),
      Err(Error::UnknownCategory(s)) if s == "villains"
    ));
  }

  #[test]
  fn placeholders_are_distinct_per_category() {
    let mut paths: Vec<_> = Category::ALL.iter().map(|c| c.default_asset_path()).collect();
    paths.sort_unstable();
    paths.dedup();
    assert_eq!(paths.len(), Category::ALL.len());
    assert!(Category::Notes.is_placeholder("defaults/TheDefaultNotes.jpg"));
    assert!(!Category::Plots.is_placeholder("defaults/TheDefaultNotes.jpg"));
  }

  #[test]
  fn character_age_falls_back_to_unknown_age() {
    let age = Category::Characters.field("age").unwrap();
    assert_eq!(age.kind, FieldKind::Number);
    assert_eq!(age.fallback, "Unknown Age");
  }
}
