//! Update directives and merge rules

use serde_json::Value as JsonValue;
use serde_yaml::Value;
use std::collections::btree_map::Entry;

use crate::content::properties::{self, Properties};
use crate::content::Document;
use crate::error::StoreError;

/// `replace` and `add` directives of a Micropub update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDirectives {
    /// Overwrite these fields (first element of arrays)
    pub replace: Properties,
    /// Append these values to the existing fields
    pub add: Properties,
}

impl UpdateDirectives {
    /// Read the `replace` and `add` members of an update request
    pub fn from_request(request: &JsonValue) -> Result<Self, StoreError> {
        Ok(Self {
            replace: directive(request, "replace")?,
            add: directive(request, "add")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.add.is_empty()
    }

    /// Apply the directives to a document, `replace` first then `add`
    pub fn apply(&self, doc: &mut Document) -> Result<(), StoreError> {
        for (key, value) in &self.replace {
            replace_field(doc, key, value)?;
        }
        for (key, value) in &self.add {
            add_field(doc, key, value)?;
        }
        Ok(())
    }
}

fn directive(request: &JsonValue, name: &str) -> Result<Properties, StoreError> {
    match request.get(name) {
        None | Some(JsonValue::Null) => Ok(Properties::new()),
        Some(JsonValue::Object(map)) => Ok(map.clone()),
        Some(_) => Err(StoreError::Validation(format!(
            "'{}' must be an object of properties",
            name
        ))),
    }
}

fn replace_field(doc: &mut Document, key: &str, value: &JsonValue) -> Result<(), StoreError> {
    if key == "content" {
        doc.body = properties::content_text(value)
            .ok_or_else(|| StoreError::Validation("replace.content must be text".to_string()))?;
        return Ok(());
    }

    let first = properties::first_value(value)
        .ok_or_else(|| StoreError::Validation(format!("replace.{} has no value", key)))?;
    doc.frontmatter.insert(key, properties::to_yaml(first)?);
    Ok(())
}

fn add_field(doc: &mut Document, key: &str, value: &JsonValue) -> Result<(), StoreError> {
    if key == "content" {
        for item in properties::values(value) {
            let text = properties::content_text(item)
                .ok_or_else(|| StoreError::Validation("add.content must be text".to_string()))?;
            if doc.body.is_empty() {
                doc.body = text;
            } else {
                doc.body = format!("{}\n\n{}", doc.body, text);
            }
        }
        return Ok(());
    }

    let new_items = properties::values(value)
        .into_iter()
        .map(properties::to_yaml)
        .collect::<Result<Vec<_>, _>>()?;
    if new_items.is_empty() {
        return Ok(());
    }

    match doc.frontmatter.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(Value::Sequence(new_items));
        }
        Entry::Occupied(mut entry) => match entry.get_mut() {
            Value::Sequence(items) => items.extend(new_items),
            scalar => {
                let prior = std::mem::replace(scalar, Value::Null);
                let mut items = vec![prior];
                items.extend(new_items);
                *scalar = Value::Sequence(items);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{FrontMatter, PostId};
    use serde_json::json;

    fn doc() -> Document {
        let (fm, body) = FrontMatter::decode(
            "---\ndate: 2024-01-02T10:00:00Z\ncategory: notes\ntitle: Old\n---\n\nBody",
        )
        .unwrap();
        Document::new(PostId::parse("2024-01-02-old.md").unwrap(), fm, body)
    }

    fn directives(request: JsonValue) -> UpdateDirectives {
        UpdateDirectives::from_request(&request).unwrap()
    }

    #[test]
    fn test_replace_title_takes_first_element() {
        let mut doc = doc();
        directives(json!({"replace": {"title": ["New", "Ignored"]}}))
            .apply(&mut doc)
            .unwrap();

        assert_eq!(doc.title(), "New");
        assert_eq!(doc.body, "Body");
        assert_eq!(doc.frontmatter.get_str("category"), Some("notes"));
    }

    #[test]
    fn test_replace_content_sets_body() {
        let mut doc = doc();
        directives(json!({"replace": {"content": [{"html": "<p>New</p>"}]}}))
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc.body, "<p>New</p>");
        assert_eq!(doc.title(), "Old");
    }

    #[test]
    fn test_replace_with_empty_array_is_invalid() {
        let mut doc = doc();
        let err = directives(json!({"replace": {"title": []}}))
            .apply(&mut doc)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_add_coerces_scalar_to_list() {
        let mut doc = doc();
        directives(json!({"add": {"category": ["rust", "micropub"]}}))
            .apply(&mut doc)
            .unwrap();

        assert_eq!(
            doc.frontmatter.get("category"),
            Some(&Value::Sequence(vec![
                Value::String("notes".into()),
                Value::String("rust".into()),
                Value::String("micropub".into()),
            ]))
        );
    }

    #[test]
    fn test_add_to_missing_field_creates_list() {
        let mut doc = doc();
        directives(json!({"add": {"syndication": "https://example.org/1"}}))
            .apply(&mut doc)
            .unwrap();

        assert_eq!(
            doc.frontmatter.get("syndication"),
            Some(&Value::Sequence(vec![Value::String(
                "https://example.org/1".into()
            )]))
        );
    }

    #[test]
    fn test_add_content_appends_paragraph() {
        let mut doc = doc();
        directives(json!({"add": {"content": ["More"]}}))
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc.body, "Body\n\nMore");
    }

    #[test]
    fn test_replace_runs_before_add() {
        let mut doc = doc();
        directives(json!({
            "add": {"category": ["b"]},
            "replace": {"category": ["a"]}
        }))
        .apply(&mut doc)
        .unwrap();

        assert_eq!(
            doc.frontmatter.get("category"),
            Some(&Value::Sequence(vec![
                Value::String("a".into()),
                Value::String("b".into()),
            ]))
        );
    }

    #[test]
    fn test_malformed_directive_shape() {
        let err = UpdateDirectives::from_request(&json!({"replace": ["title"]})).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        assert!(UpdateDirectives::from_request(&json!({"url": "/x.md"}))
            .unwrap()
            .is_empty());
    }
}
