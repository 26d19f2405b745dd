use super::types::{Schema, RESERVED_FIELD_NAMES};
use crate::error::{Result, RowTreeError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FULL_SCHEMA: Regex = Regex::new(
        r"^\s*(\w+)\s*(?:\[([^\]]*)\])?\s*/\s*(\w+)\s*\(([^)]*)\)\s*$"
    )
    .unwrap();
    static ref SUMMARY_ONLY_SCHEMA: Regex =
        Regex::new(r"^\s*(\w+)\s*(?:\[([^\]]*)\])?\s*$").unwrap();
    static ref NAME: Regex = Regex::new(r"^\w+$").unwrap();
}

/// Parse a schema string, taking the first field as the default key.
pub fn parse_schema_str(s: &str) -> Result<Schema> {
    parse_schema_with_key(s, None)
}

/// Parse a schema string with an explicit default key.
pub fn parse_schema_with_key(s: &str, default_key: Option<&str>) -> Result<Schema> {
    let (root_name, raw_summary, record_name, raw_fields) = if let Some(caps) =
        FULL_SCHEMA.captures(s)
    {
        (
            caps[1].to_string(),
            caps.get(2).map(|m| m.as_str()),
            Some(caps[3].to_string()),
            Some(caps.get(4).map(|m| m.as_str()).unwrap_or("")),
        )
    } else if let Some(caps) = SUMMARY_ONLY_SCHEMA.captures(s) {
        (caps[1].to_string(), caps.get(2).map(|m| m.as_str()), None, None)
    } else {
        return Err(RowTreeError::SchemaSyntax(format!(
            "'{s}' does not match root[summary]/record(fields)"
        )));
    };

    let summary_fields = split_names(raw_summary.unwrap_or(""))?;
    let fields = match raw_fields {
        Some(raw) => {
            let fields = split_names(raw)?;
            if fields.is_empty() {
                return Err(RowTreeError::SchemaSyntax(format!(
                    "'{s}' declares a record without fields"
                )));
            }
            fields
        }
        None => Vec::new(),
    };

    for (i, field) in fields.iter().enumerate() {
        if RESERVED_FIELD_NAMES.contains(&field.as_str()) {
            return Err(RowTreeError::ReservedFieldName(field.clone()));
        }
        if fields[..i].contains(field) {
            return Err(RowTreeError::SchemaSyntax(format!(
                "field '{field}' is declared twice"
            )));
        }
    }

    if let Some(key) = default_key {
        if !fields.is_empty() && !fields.iter().any(|f| f == key) {
            return Err(RowTreeError::UnknownField(key.to_string()));
        }
    }

    Ok(Schema {
        raw: s.trim().to_string(),
        root_name,
        summary_fields,
        record_name,
        default_key: default_key
            .map(|k| k.to_string())
            .or_else(|| fields.first().cloned()),
        fields,
    })
}

/// True for names usable as fields and element names.
pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

fn split_names(raw: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for part in raw.split(',') {
        let name = part.trim();
        if name.is_empty() {
            continue;
        }
        if !NAME.is_match(name) {
            return Err(RowTreeError::SchemaSyntax(format!(
                "'{name}' is not a valid name"
            )));
        }
        names.push(name.to_string());
    }
    Ok(names)
}
