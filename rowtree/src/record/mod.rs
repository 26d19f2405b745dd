// Records - one keyed row with implicit id and timestamps

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Marker that opens an embedded YAML block inside a field value.
pub const BLOCK_MARKER: &str = "---";

/// A field value: plain text, or a nested structure decoded from an embedded
/// YAML block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Nested(serde_yaml::Value),
}

impl FieldValue {
    /// Decode raw field text: `---` blocks become nested values, anything
    /// else has `&lt;`/`&gt;` restored.
    pub fn decode(raw: &str) -> Result<Self> {
        if raw.starts_with(BLOCK_MARKER) {
            let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
            return Ok(FieldValue::Nested(value));
        }
        Ok(FieldValue::Text(raw.replace("&lt;", "<").replace("&gt;", ">")))
    }

    /// Build a value from an already-parsed YAML node.
    pub fn from_yaml(value: &serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match value {
            Value::Null => FieldValue::Text(String::new()),
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            Value::Number(n) => FieldValue::Text(n.to_string()),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Tagged(tagged) => FieldValue::from_yaml(&tagged.value),
            Value::Sequence(_) | Value::Mapping(_) => FieldValue::Nested(value.clone()),
        }
    }

    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            FieldValue::Text(s) => serde_yaml::Value::String(s.clone()),
            FieldValue::Nested(v) => v.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Nested(v) => v.is_null(),
        }
    }

    /// Text form: the string itself, or the nested value as a `---` block.
    pub fn encode(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s),
            FieldValue::Nested(v) => {
                let body = serde_yaml::to_string(v).unwrap_or_default();
                Cow::Owned(format!("{BLOCK_MARKER}\n{}", body.trim_end()))
            }
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Text(String::new())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Field name → value, in schema order.
pub type Body = IndexMap<String, FieldValue>;

/// A stored record with its implicit attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub id: String,
    pub created: String,
    /// Empty until the record is first modified
    #[serde(default)]
    pub last_modified: String,
    /// Extra attributes found on the record element
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    pub body: Body,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.body.get(field)
    }

    /// Text of a field, nested values encoded; empty when absent.
    pub fn text(&self, field: &str) -> Cow<'_, str> {
        self.body
            .get(field)
            .map(|v| v.encode())
            .unwrap_or(Cow::Borrowed(""))
    }
}

/// Current time in the timestamp format used for `created`/`last_modified`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string()
}
