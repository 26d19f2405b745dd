use serde::{Deserialize, Serialize};

/// Field name used for the generated surrogate key when a decoded batch has
/// non-unique natural keys.
pub const SURROGATE_KEY_FIELD: &str = "uid";

/// Version of the reserved word sets below. Bump when either list changes.
pub const RESERVED_WORDS_VERSION: u32 = 1;

/// Field names rejected outright when a schema is parsed.
pub const RESERVED_FIELD_NAMES: &[&str] = &["require", "parent", "gem", SURROGATE_KEY_FIELD];

/// Field names that collide with document operations. They are allowed in a
/// schema but written to the tree with [`RESERVED_PREFIX`] and stripped again
/// on load.
pub const PREFIXED_FIELD_NAMES: &[&str] = &[
    "add", "class", "create", "delete", "display", "element", "fields", "format", "hash",
    "id", "import", "inspect", "parse", "record", "records", "save", "schema", "select",
    "send", "summary", "update",
];

pub const RESERVED_PREFIX: &str = "_";

/// A parsed schema string such as `contacts[title]/contact(name,age,dob)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// The schema string as given
    pub raw: String,
    pub root_name: String,
    #[serde(default)]
    pub summary_fields: Vec<String>,
    /// `None` for the summary-only form
    #[serde(default)]
    pub record_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub default_key: Option<String>,
}

impl Schema {
    /// True when the schema carries a record part.
    pub fn has_records(&self) -> bool {
        self.record_name.is_some()
    }

    /// The record element name, falling back to `item` for summary-only schemas.
    pub fn record_name(&self) -> &str {
        self.record_name.as_deref().unwrap_or("item")
    }

    /// The field whose value keys each record.
    pub fn default_key(&self) -> Option<&str> {
        self.default_key
            .as_deref()
            .or_else(|| self.fields.first().map(|f| f.as_str()))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Append the surrogate key field (once) and make it the default key.
    pub fn promote_surrogate_key(&mut self) {
        if !self.has_field(SURROGATE_KEY_FIELD) {
            self.fields.push(SURROGATE_KEY_FIELD.to_string());
        }
        self.default_key = Some(SURROGATE_KEY_FIELD.to_string());
    }

    /// The default format mask: every field placeholder joined by `delimiter`.
    pub fn default_format_mask(&self, delimiter: &str) -> String {
        self.fields
            .iter()
            .filter(|f| f.as_str() != SURROGATE_KEY_FIELD)
            .map(|f| format!("[!{f}]"))
            .collect::<Vec<_>>()
            .join(delimiter)
    }
}

/// Name a field is written under in the tree.
pub fn element_name_for(field: &str) -> String {
    if PREFIXED_FIELD_NAMES.contains(&field) {
        format!("{RESERVED_PREFIX}{field}")
    } else {
        field.to_string()
    }
}

/// Inverse of [`element_name_for`].
pub fn field_name_for(element: &str) -> &str {
    match element.strip_prefix(RESERVED_PREFIX) {
        Some(rest) if PREFIXED_FIELD_NAMES.contains(&rest) => rest,
        _ => element,
    }
}
