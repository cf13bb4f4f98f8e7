//! Front-matter encoding and decoding
//!
//! Documents are stored as
//!
//! ```text
//! ---
//! date: 2024-01-02T10:00:00+00:00
//! tags: ["rust", "micropub"]
//! title: Hello
//! ---
//!
//! Post body, verbatim.
//! ```
//!
//! Keys are written in sorted order so that encoding is deterministic and
//! diffs stay small.

use serde_yaml::Value;
use std::collections::btree_map::{BTreeMap, Entry};

use crate::error::StoreError;

/// Delimiter line around the metadata block
pub const DELIMITER: &str = "---";

/// Front-matter of a stored post, sorted by key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    fields: BTreeMap<String, Value>,
}

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field as a string, if it is a scalar string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Insert or overwrite a field, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Mutable access to a field, used by the append merge
    pub fn entry(&mut self, key: impl Into<String>) -> Entry<'_, String, Value> {
        self.fields.entry(key.into())
    }

    /// Encode front-matter and body into the stored text layout
    pub fn encode(&self, body: &str) -> Result<String, StoreError> {
        let mut out = String::new();
        out.push_str(DELIMITER);
        out.push('\n');

        for (key, value) in &self.fields {
            out.push_str(&render_string(key)?);
            out.push_str(": ");
            out.push_str(&render_value(value)?);
            out.push('\n');
        }

        out.push_str(DELIMITER);
        out.push_str("\n\n");
        out.push_str(body);

        Ok(out)
    }

    /// Decode stored text into front-matter and body
    ///
    /// The text must split into exactly three segments: nothing before the
    /// opening `---` line, the metadata block, and everything after the
    /// closing `---` line. One blank separator line after the closing
    /// delimiter is consumed; the rest is returned as the body.
    pub fn decode(text: &str) -> Result<(Self, String), StoreError> {
        let rest = if text == DELIMITER {
            ""
        } else {
            text.strip_prefix("---\n")
                .ok_or_else(|| StoreError::format("missing opening front-matter delimiter"))?
        };

        let (block, after) = split_closing(rest)
            .ok_or_else(|| StoreError::format("missing closing front-matter delimiter"))?;

        let after = after.strip_prefix('\n').unwrap_or(after);
        let body = after.strip_prefix('\n').unwrap_or(after);

        Ok((parse_block(block)?, body.to_string()))
    }
}

impl FromIterator<(String, Value)> for FrontMatter {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Find the closing delimiter line.
/// Returns (metadata block, text after the delimiter's dashes).
fn split_closing(rest: &str) -> Option<(&str, &str)> {
    if rest == DELIMITER || rest.starts_with("---\n") {
        return Some(("", &rest[DELIMITER.len()..]));
    }

    for (pos, _) in rest.match_indices("\n---") {
        let after = &rest[pos + 4..];
        if after.is_empty() || after.starts_with('\n') {
            return Some((&rest[..=pos], after));
        }
    }

    None
}

fn parse_block(block: &str) -> Result<FrontMatter, StoreError> {
    if block.trim().is_empty() {
        return Ok(FrontMatter::new());
    }

    let parsed: Value = serde_yaml::from_str(block)
        .map_err(|e| StoreError::Format(format!("invalid front-matter: {}", e)))?;

    match parsed {
        Value::Null => Ok(FrontMatter::new()),
        Value::Mapping(mapping) => mapping
            .into_iter()
            .map(|(key, value)| match key {
                _ if is_tagged(&value) => Err(StoreError::format(
                    "tagged values are not supported in front-matter",
                )),
                Value::String(key) => Ok((key, value)),
                other => Err(StoreError::Format(format!(
                    "front-matter key is not a string: {:?}",
                    other
                ))),
            })
            .collect(),
        _ => Err(StoreError::format(
            "front-matter is not a list of key: value pairs",
        )),
    }
}

/// Whether a `!tag` appears anywhere in the value
fn is_tagged(value: &Value) -> bool {
    match value {
        Value::Tagged(_) => true,
        Value::Sequence(items) => items.iter().any(is_tagged),
        Value::Mapping(mapping) => mapping.iter().any(|(k, v)| is_tagged(k) || is_tagged(v)),
        _ => false,
    }
}

/// Render a value on a single line.
///
/// Sequences and mappings use flow syntax so every field stays one line.
fn render_value(value: &Value) -> Result<String, StoreError> {
    match value {
        Value::String(s) => render_string(s),
        Value::Sequence(_) | Value::Mapping(_) => render_flow(value),
        Value::Tagged(_) => Err(StoreError::format(
            "tagged values are not supported in front-matter",
        )),
        scalar => render_scalar(scalar),
    }
}

/// Plain or quoted YAML string, falling back to a double-quoted JSON string
/// (valid YAML) when the YAML form would span lines.
fn render_string(s: &str) -> Result<String, StoreError> {
    if !s.contains(['\n', '\r']) {
        let yaml = serde_yaml::to_string(s).map_err(StoreError::format)?;
        let yaml = yaml.trim_end_matches('\n');
        if !yaml.contains('\n') {
            return Ok(yaml.to_string());
        }
    }
    serde_json::to_string(s).map_err(StoreError::format)
}

fn render_scalar(value: &Value) -> Result<String, StoreError> {
    Ok(match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => return render_flow(value),
    })
}

fn render_flow(value: &Value) -> Result<String, StoreError> {
    match value {
        Value::String(s) => serde_json::to_string(s).map_err(StoreError::format),
        Value::Sequence(items) => {
            let items = items
                .iter()
                .map(render_flow)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Value::Mapping(mapping) => {
            let entries = mapping
                .iter()
                .map(|(k, v)| Ok(format!("{}: {}", render_flow(k)?, render_flow(v)?)))
                .collect::<Result<Vec<_>, StoreError>>()?;
            Ok(format!("{{{}}}", entries.join(", ")))
        }
        Value::Tagged(_) => Err(StoreError::format(
            "tagged values are not supported in front-matter",
        )),
        scalar => render_scalar(scalar),
    }
}
