//! Micropub request parsing
//!
//! JSON bodies are used as sent. Form bodies are folded into the same JSON
//! shape: `h=entry` becomes `"type": ["h-entry"]`, `action` and `url` stay
//! top-level, `key[]` fields become arrays and everything else goes into
//! `properties` (a repeated plain key also becomes an array).

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde_json::{json, Map, Value as JsonValue};
use thiserror::Error;

use crate::content::Properties;
use crate::error::StoreError;
use crate::store::UpdateDirectives;

const JSON_TYPE: &str = "application/json";
const FORM_TYPE: &str = "application/x-www-form-urlencoded";

/// Errors raised while reading a request, before the store is involved
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Unsupported Content-Type: {0}")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    Invalid(String),
}

/// Which operation a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

/// A fully parsed Micropub request
#[derive(Debug, Clone, PartialEq)]
pub enum MicropubAction {
    Create(Properties),
    Update {
        url: String,
        directives: UpdateDirectives,
    },
    Delete {
        url: String,
    },
}

/// Decode a request body according to its content type
pub fn parse_body(content_type: &str, body: &[u8]) -> Result<JsonValue, RequestError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        JSON_TYPE => serde_json::from_slice(body)
            .map_err(|e| RequestError::Invalid(format!("Error parsing JSON: {}", e))),
        FORM_TYPE => parse_form(body),
        _ => Err(RequestError::UnsupportedMediaType(content_type.to_string())),
    }
}

/// Work out the action of a decoded request.
///
/// `forced` comes from the HTTP method (PUT updates, DELETE deletes);
/// otherwise the `action` field decides and its absence means create.
pub fn resolve_action(
    document: &JsonValue,
    forced: Option<ActionKind>,
) -> Result<MicropubAction, RequestError> {
    let object = document
        .as_object()
        .ok_or_else(|| RequestError::Invalid("Request body must be an object".to_string()))?;

    let kind = match forced {
        Some(kind) => kind,
        None => match object.get("action").and_then(JsonValue::as_str) {
            None => ActionKind::Create,
            Some("update") => ActionKind::Update,
            Some("delete") => ActionKind::Delete,
            Some(other) => {
                return Err(RequestError::Invalid(format!(
                    "Unsupported action: {}",
                    other
                )))
            }
        },
    };

    match kind {
        ActionKind::Create => {
            if !has_type(object) {
                return Err(RequestError::Invalid("Missing 'type' field".to_string()));
            }
            match object.get("properties") {
                Some(JsonValue::Object(properties)) => {
                    Ok(MicropubAction::Create(properties.clone()))
                }
                _ => Err(RequestError::Invalid(
                    "Missing or invalid 'properties' field".to_string(),
                )),
            }
        }
        ActionKind::Update => {
            let url = target_url(object)?;
            let directives = UpdateDirectives::from_request(document).map_err(|e| match e {
                StoreError::Validation(message) => RequestError::Invalid(message),
                other => RequestError::Invalid(other.to_string()),
            })?;
            Ok(MicropubAction::Update { url, directives })
        }
        ActionKind::Delete => Ok(MicropubAction::Delete {
            url: target_url(object)?,
        }),
    }
}

fn has_type(object: &Map<String, JsonValue>) -> bool {
    match object.get("type") {
        Some(JsonValue::Array(items)) => !items.is_empty(),
        Some(JsonValue::String(s)) => !s.is_empty(),
        _ => false,
    }
}

fn target_url(object: &Map<String, JsonValue>) -> Result<String, RequestError> {
    object
        .get("url")
        .and_then(JsonValue::as_str)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| RequestError::Invalid("Missing 'url' field".to_string()))
}

fn parse_form(body: &[u8]) -> Result<JsonValue, RequestError> {
    let body = std::str::from_utf8(body)
        .map_err(|_| RequestError::Invalid("Form body is not valid UTF-8".to_string()))?;

    let mut fields: IndexMap<String, Vec<String>> = IndexMap::new();
    for pair in body.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        fields
            .entry(decode_component(key)?)
            .or_default()
            .push(decode_component(value)?);
    }

    let mut document = Map::new();
    let mut properties = Properties::new();

    for (key, mut values) in fields {
        match key.as_str() {
            "h" => {
                let kind = values.first().cloned().unwrap_or_default();
                document.insert("type".to_string(), json!([format!("h-{}", kind)]));
            }
            "action" | "url" => {
                let value = values.first().cloned().unwrap_or_default();
                document.insert(key, JsonValue::String(value));
            }
            _ => {
                if let Some(name) = key.strip_suffix("[]") {
                    properties.insert(name.to_string(), json!(values));
                } else if values.len() == 1 {
                    properties.insert(key, JsonValue::String(values.remove(0)));
                } else {
                    properties.insert(key, json!(values));
                }
            }
        }
    }

    document.insert("properties".to_string(), JsonValue::Object(properties));
    Ok(JsonValue::Object(document))
}

fn decode_component(raw: &str) -> Result<String, RequestError> {
    let raw = raw.replace('+', " ");
    percent_decode_str(&raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| RequestError::Invalid(format!("Invalid form encoding: {}", raw)))
}
