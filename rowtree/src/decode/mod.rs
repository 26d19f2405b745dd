//! Plain-text import.
//!
//! Text is decoded in three stages: an optional header pragma carrying
//! configuration overrides ([`split_pragma`]), an optional block of
//! `label: value` summary lines, and the records themselves in one of four
//! dialects chosen by the first content line:
//!
//! | first line | dialect                                   |
//! |------------|-------------------------------------------|
//! | `---`      | YAML sequences or mappings                |
//! | `--+`      | blank-line separated `field: value` blocks |
//! | `--#`      | sections split at `# ` headings           |
//! | otherwise  | one record per line, shaped by the format mask |
//!
//! Nothing here touches a store: the whole batch is decoded and checked
//! before the caller merges it.

mod block;
mod header;
mod line;
mod section;
mod yaml;

pub use header::{split_pragma, Pragma};
pub use section::{is_heading, SEPARATOR as SECTION_SEPARATOR};

use crate::error::{Result, RowTreeError};
use crate::record::{Body, FieldValue};
use crate::schema::{Schema, SURROGATE_KEY_FIELD};
use crate::store::body_from_pairs;
use crate::template::FormatMask;

/// A line of input with its 1-based number in the original text.
pub type Line<'a> = (usize, &'a str);

/// One decoded row: `(field, value)` pairs as found in the text.
pub type RawRow = Vec<(String, FieldValue)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Line,
    Block,
    Section,
    Yaml,
}

impl Dialect {
    /// Pick the dialect from the first non-blank line.
    pub fn sniff(lines: &[Line<'_>]) -> Dialect {
        let first = lines
            .iter()
            .map(|(_, l)| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("");
        if first.starts_with("--+") {
            Dialect::Block
        } else if first.starts_with("--#") {
            Dialect::Section
        } else if first.starts_with("---") {
            Dialect::Yaml
        } else {
            Dialect::Line
        }
    }
}

/// Decoding switches taken from the document configuration.
#[derive(Debug, Clone, Copy)]
pub struct DecodeSettings<'a> {
    /// Needed only by the line dialect
    pub mask: Option<&'a FormatMask>,
    pub unique: bool,
    pub linked: bool,
}

/// A fully decoded batch, ready to merge.
#[derive(Debug, Clone)]
pub struct Batch {
    pub dialect: Dialect,
    /// Values from the leading summary block
    pub summary: Vec<(String, String)>,
    pub rows: Vec<(String, Body)>,
    /// The surrogate key was promoted for this batch
    pub promoted: bool,
}

/// Number the lines of `text`.
pub fn number_lines(text: &str) -> Vec<Line<'_>> {
    text.lines().enumerate().map(|(i, l)| (i + 1, l)).collect()
}

/// Decode everything after the pragma into keyed bodies.
pub fn decode_lines(
    lines: &[Line<'_>],
    schema: &Schema,
    settings: DecodeSettings<'_>,
) -> Result<Batch> {
    let (summary, rest) = header::split_summary(lines, &schema.summary_fields);
    let dialect = Dialect::sniff(rest);
    log::debug!("decoding {} lines as {:?}", rest.len(), dialect);

    let raw_rows = match dialect {
        Dialect::Yaml => yaml::decode(rest, &schema.fields)?,
        Dialect::Block => block::decode(rest, &schema.fields)?,
        Dialect::Section => section::decode(rest, &schema.fields)?,
        Dialect::Line => {
            let mask = settings
                .mask
                .ok_or_else(|| RowTreeError::Config("line import needs a format mask".into()))?;
            line::decode(rest, mask, settings.linked)?
        }
    };

    let (rows, promoted) = key_rows(raw_rows, schema, settings.unique)?;
    Ok(Batch {
        dialect,
        summary,
        rows,
        promoted,
    })
}

/// Shape raw rows into schema-ordered bodies keyed by the default key,
/// promoting the surrogate key when the natural keys repeat.
fn key_rows(raw_rows: Vec<RawRow>, schema: &Schema, unique: bool) -> Result<(Vec<(String, Body)>, bool)> {
    if raw_rows.is_empty() {
        return Ok((Vec::new(), false));
    }
    let key_field = schema
        .default_key()
        .ok_or_else(|| RowTreeError::Config("schema has no record fields to key on".into()))?
        .to_string();

    let mut bodies: Vec<Body> = raw_rows
        .into_iter()
        .map(|row| body_from_pairs(&schema.fields, row))
        .collect();

    let keys: Vec<String> = bodies
        .iter()
        .map(|b| b.get(&key_field).map(|v| v.encode().into_owned()).unwrap_or_default())
        .collect();

    let duplicate = first_duplicate(&keys);
    let surrogate = key_field == SURROGATE_KEY_FIELD;
    if let Some(key) = &duplicate {
        if unique {
            return Err(RowTreeError::DuplicateKey { key: key.clone() });
        }
    }

    if duplicate.is_none() && !surrogate {
        return Ok((keys.into_iter().zip(bodies).collect(), false));
    }

    log::debug!("keys repeat in batch, numbering rows with '{SURROGATE_KEY_FIELD}'");
    let rows = bodies
        .iter_mut()
        .enumerate()
        .map(|(i, body)| {
            let key = (i + 1).to_string();
            body.insert(SURROGATE_KEY_FIELD.to_string(), FieldValue::Text(key.clone()));
            (key, body.clone())
        })
        .collect();
    Ok((rows, true))
}

fn first_duplicate(keys: &[String]) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    keys.iter().find(|k| !seen.insert(k.as_str())).cloned()
}
