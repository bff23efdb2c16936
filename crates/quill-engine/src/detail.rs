//! Read-only presentation of a record: every schema field with its label,
//! fallbacks applied, plus the image to show.

use quill_core::{Category, CategoryRecord, FieldKind, ImageRef};

use crate::editor::Draft;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayField {
  pub name:  &'static str,
  pub label: &'static str,
  pub kind:  FieldKind,
  /// The stored value, `None` when empty.
  pub value: Option<String>,
  /// What to show: the value, or the field's fallback.
  pub text:  String,
}

impl DisplayField {
  pub fn is_fallback(&self) -> bool { self.value.is_none() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
  pub category: Category,
  pub heading:  String,
  /// A blob locator, placeholder path or `data:` URL.
  pub image:    String,
  pub fields:   Vec<DisplayField>,
}

impl DetailView {
  pub fn of(record: &CategoryRecord) -> Self {
    let fields = record
      .fields
      .iter()
      .map(|(spec, value)| {
        let shown = value.display();
        DisplayField {
          name:  spec.name,
          label: spec.label,
          kind:  spec.kind,
          text:  shown.clone().unwrap_or_else(|| spec.fallback.to_owned()),
          value: shown,
        }
      })
      .collect();

    Self {
      category: record.category,
      heading: record.title(),
      image: record.image.display_locator(record.category).to_string(),
      fields,
    }
  }

  /// Preview of an unsaved draft. Raw input is shown as typed; `staged` is
  /// the preview URL of a not-yet-committed image.
  pub fn of_draft(draft: &Draft, staged: Option<String>) -> Self {
    let category = draft.category();
    let fields = category
      .fields()
      .iter()
      .map(|spec| {
        let shown = draft
          .value(spec.name)
          .filter(|v| !v.trim().is_empty())
          .map(str::to_owned);
        DisplayField {
          name:  spec.name,
          label: spec.label,
          kind:  spec.kind,
          text:  shown.clone().unwrap_or_else(|| spec.fallback.to_owned()),
          value: shown,
        }
      })
      .collect::<Vec<_>>();

    let heading = fields
      .first()
      .and_then(|f| f.value.clone())
      .unwrap_or_else(|| "Untitled".to_owned());
    let image = staged.unwrap_or_else(|| match draft.image() {
      ImageRef::Placeholder => category.default_asset_path().to_owned(),
      ImageRef::Asset(locator) => locator.to_string(),
    });

    Self { category, heading, image, fields }
  }

  pub fn field(&self, name: &str) -> Option<&DisplayField> {
    self.fields.iter().find(|f| f.name == name)
  }
}

#[cfg(test)]
mod tests {
  use quill_core::{AssetLocator, FieldValue, Fields};

  use super::*;

  fn character(age: FieldValue) -> CategoryRecord {
    let mut fields = Fields::new(Category::Characters);
    fields.set("name", FieldValue::Text("Ada".into())).unwrap();
    fields.set("age", age).unwrap();
    CategoryRecord {
      id: "c1".into(),
      story_id: "s1".into(),
      category: Category::Characters,
      fields,
      image: ImageRef::Placeholder,
      created_at: None,
      version: 1,
    }
  }

  #[test]
  fn blank_age_shows_fallback() {
    let view = DetailView::of(&character(FieldValue::Empty));
    let age = view.field("age").unwrap();
    assert_eq!(age.text, "Unknown Age");
    assert!(age.is_fallback());
    assert_eq!(view.heading, "Ada");
    assert_eq!(view.image, "defaults/TheDefaultCharacter.jpg");
  }

  #[test]
  fn every_schema_field_is_present_in_order() {
    let view = DetailView::of(&character(FieldValue::Number(36.0)));
    let names: Vec<_> = view.fields.iter().map(|f| f.name).collect();
    let schema: Vec<_> = Category::Characters.fields().iter().map(|f| f.name).collect();
    assert_eq!(names, schema);
    assert_eq!(view.field("age").unwrap().text, "36");
  }

  #[test]
  fn asset_image_is_shown_by_locator() {
    let mut record = character(FieldValue::Empty);
    record.image = ImageRef::Asset(AssetLocator::new("characters/s1/1-0-ada.png"));
    assert_eq!(DetailView::of(&record).image, "characters/s1/1-0-ada.png");
  }
}
