// YAML dialect
//
// Accepted shapes:
//   mapping of sequences   key: [rest...]
//   mapping of mappings    key: {field: value}
//   sequence of sequences  - [all fields...]
//   sequence of mappings   - {field: value}
//   sequence of scalars    - first field

use super::{Line, RawRow};
use crate::error::{Result, RowTreeError};
use crate::record::FieldValue;
use serde_yaml::{Mapping, Value};

pub fn decode(lines: &[Line<'_>], fields: &[String]) -> Result<Vec<RawRow>> {
    let start = lines.first().map(|(n, _)| *n).unwrap_or(1);
    let text = lines.iter().map(|(_, l)| *l).collect::<Vec<_>>().join("\n");
    let document: Value = serde_yaml::from_str(&text).map_err(|e| parse_error(&e, lines, start))?;

    match document {
        Value::Null => Ok(Vec::new()),
        Value::Mapping(map) => map
            .iter()
            .map(|(key, value)| keyed_row(key, value, fields))
            .collect(),
        Value::Sequence(items) => items.iter().map(|item| item_row(item, fields)).collect(),
        _ => Err(RowTreeError::decode(start, "expected a YAML sequence or mapping")),
    }
}

/// Point a YAML parse failure at the offending input line.
fn parse_error(err: &serde_yaml::Error, lines: &[Line<'_>], start: usize) -> RowTreeError {
    match err.location() {
        Some(location) => {
            let index = location.line().saturating_sub(1);
            // Errors at end of input point past the last line
            match lines.get(index).or_else(|| lines.last()) {
                Some(&(number, line)) => RowTreeError::decode(number, line),
                None => RowTreeError::decode(start, err.to_string()),
            }
        }
        None => RowTreeError::decode(start, err.to_string()),
    }
}

/// A field value from a YAML node. Strings get the same treatment as text
/// from the other dialects.
fn field_value(value: &Value) -> Result<FieldValue> {
    match FieldValue::from_yaml(value) {
        FieldValue::Text(text) => FieldValue::decode(&text),
        nested => Ok(nested),
    }
}

/// `key: value` where the key is the first field.
fn keyed_row(key: &Value, value: &Value, fields: &[String]) -> Result<RawRow> {
    let mut row = RawRow::new();
    if let Some(first) = fields.first() {
        row.push((first.clone(), field_value(key)?));
    }
    match value {
        Value::Sequence(rest) => row.extend(positional(rest, fields.iter().skip(1))?),
        Value::Mapping(map) => row.extend(mapped(map, fields, 1)?),
        Value::Null => {}
        scalar => {
            if let Some(second) = fields.get(1) {
                row.push((second.clone(), field_value(scalar)?));
            }
        }
    }
    Ok(row)
}

fn item_row(item: &Value, fields: &[String]) -> Result<RawRow> {
    match item {
        Value::Sequence(values) => positional(values, fields.iter()),
        Value::Mapping(map) => mapped(map, fields, 0),
        scalar => match fields.first() {
            Some(f) => Ok(vec![(f.clone(), field_value(scalar)?)]),
            None => Ok(RawRow::new()),
        },
    }
}

fn positional<'f>(values: &[Value], fields: impl Iterator<Item = &'f String>) -> Result<RawRow> {
    fields
        .zip(values)
        .map(|(f, v)| -> Result<(String, FieldValue)> { Ok((f.clone(), field_value(v)?)) })
        .collect()
}

/// Values of a mapping: by field name when every key is a field, otherwise
/// positionally from `fields[offset..]`.
fn mapped(map: &Mapping, fields: &[String], offset: usize) -> Result<RawRow> {
    let named = map
        .keys()
        .all(|k| k.as_str().map(|k| fields.iter().any(|f| f == k)).unwrap_or(false));
    if named {
        map.iter()
            .filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
            .map(|(k, v)| -> Result<(String, FieldValue)> { Ok((k.to_string(), field_value(v)?)) })
            .collect()
    } else {
        let values: Vec<Value> = map.values().cloned().collect();
        positional(&values, fields.iter().skip(offset))
    }
}
