//! Micropub property bag helpers
//!
//! Micropub clients send most properties as arrays (`"title": ["Hello"]`)
//! but form posts and older clients send plain strings. These helpers accept
//! either shape.

use serde_json::Value as JsonValue;

use crate::error::StoreError;

/// Micropub `properties` object
pub type Properties = serde_json::Map<String, JsonValue>;

/// First element of an array-valued property, or the value itself
pub fn first_value(value: &JsonValue) -> Option<&JsonValue> {
    match value {
        JsonValue::Array(items) => items.first(),
        other => Some(other),
    }
}

/// Single-value text of a property such as `title`
pub fn scalar_text(value: &JsonValue) -> Option<String> {
    match first_value(value)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text of a `content` property.
///
/// Besides strings, accepts the Micropub object form where `html` is
/// preferred over `value`.
pub fn content_text(value: &JsonValue) -> Option<String> {
    match first_value(value)? {
        JsonValue::Object(object) => object
            .get("html")
            .or_else(|| object.get("value"))
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        other => scalar_text(other),
    }
}

/// Elements of a property as a list, wrapping a lone scalar
pub fn values(value: &JsonValue) -> Vec<&JsonValue> {
    match value {
        JsonValue::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Keys that are never copied into front-matter
pub fn is_reserved(key: &str) -> bool {
    matches!(key, "title" | "content") || key.starts_with("mp-")
}

/// Convert a JSON property value into a front-matter value
pub fn to_yaml(value: &JsonValue) -> Result<serde_yaml::Value, StoreError> {
    serde_yaml::to_value(value).map_err(StoreError::format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_text_accepts_array_or_string() {
        assert_eq!(scalar_text(&json!(["Hello"])), Some("Hello".to_string()));
        assert_eq!(scalar_text(&json!("Hello")), Some("Hello".to_string()));
        assert_eq!(scalar_text(&json!(["a", "b"])), Some("a".to_string()));
        assert_eq!(scalar_text(&json!(42)), Some("42".to_string()));
        assert_eq!(scalar_text(&json!([])), None);
        assert_eq!(scalar_text(&json!({"x": 1})), None);
    }

    #[test]
    fn test_content_text_object_form() {
        assert_eq!(
            content_text(&json!([{"html": "<p>hi</p>", "value": "hi"}])),
            Some("<p>hi</p>".to_string())
        );
        assert_eq!(
            content_text(&json!({"value": "plain"})),
            Some("plain".to_string())
        );
        assert_eq!(content_text(&json!(["World"])), Some("World".to_string()));
        assert_eq!(content_text(&json!([{}])), None);
    }

    #[test]
    fn test_values_wraps_scalars() {
        assert_eq!(values(&json!("x")), vec![&json!("x")]);
        assert_eq!(values(&json!(["x", "y"])).len(), 2);
    }

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved("content"));
        assert!(is_reserved("mp-slug"));
        assert!(!is_reserved("category"));
    }

    #[test]
    fn test_to_yaml() {
        let value = to_yaml(&json!(["rust", 1, true])).unwrap();
        assert_eq!(
            value,
            serde_yaml::Value::Sequence(vec![
                serde_yaml::Value::String("rust".into()),
                serde_yaml::Value::Number(1u64.into()),
                serde_yaml::Value::Bool(true),
            ])
        );
    }
}
