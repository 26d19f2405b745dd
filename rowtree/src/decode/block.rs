// Block dialect: `field: value` stanzas separated by blank lines
//
// The stanzas are first laid out as an `items/item` tree so that labels are
// resolved once, against the whole batch, before any row is built.

use super::{Line, RawRow};
use crate::error::{Result, RowTreeError};
use crate::record::FieldValue;
use crate::tree::{escape, unescape, Element};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LABEL: Regex = Regex::new(r"^(\w+):(?:\s(.*))?$").unwrap();
}

/// One `label: value` entry with the line it started on.
#[derive(Debug)]
struct Entry {
    line: usize,
    label: String,
    value: String,
}

pub fn decode(lines: &[Line<'_>], fields: &[String]) -> Result<Vec<RawRow>> {
    let stanzas = read_stanzas(skip_marker(lines))?;
    let tree = outline(&stanzas, fields)?;

    let mut rows = Vec::new();
    for item in tree.elements() {
        let mut row = RawRow::new();
        for child in item.elements() {
            row.push((child.name.clone(), FieldValue::decode(&unescape(&child.text()))?));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn skip_marker<'l, 'a>(lines: &'l [Line<'a>]) -> &'l [Line<'a>] {
    match lines.iter().position(|(_, l)| !l.trim().is_empty()) {
        Some(pos) if lines[pos].1.trim().starts_with("--+") => &lines[pos + 1..],
        _ => lines,
    }
}

/// Group lines into stanzas of entries.
fn read_stanzas(lines: &[Line<'_>]) -> Result<Vec<Vec<Entry>>> {
    let mut stanzas: Vec<Vec<Entry>> = Vec::new();
    let mut current: Vec<Entry> = Vec::new();

    for &(number, line) in lines {
        if is_separator(line) {
            if !current.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            continue;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !indented {
            if let Some(caps) = LABEL.captures(line.trim_end()) {
                current.push(Entry {
                    line: number,
                    label: caps[1].to_string(),
                    value: caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
                });
                continue;
            }
        }

        // continuation of the previous value
        let Some(entry) = current.last_mut() else {
            return Err(RowTreeError::decode(number, line));
        };
        let continued = line
            .strip_prefix("  ")
            .or_else(|| line.strip_prefix('\t'))
            .unwrap_or_else(|| line.trim_start());
        entry.value.push('\n');
        entry.value.push_str(continued.trim_end());
    }
    if !current.is_empty() {
        stanzas.push(current);
    }

    for entry in stanzas.iter_mut().flatten() {
        let trimmed = entry.value.trim_end().len();
        entry.value.truncate(trimmed);
    }
    Ok(stanzas)
}

/// Blank lines end a stanza, except whitespace lines indented like a
/// continuation, which keep an empty line inside a multi-line value.
fn is_separator(line: &str) -> bool {
    line.trim().is_empty() && !line.starts_with("  ")
}

/// Build the `items/item` tree, resolving labels to field names.
///
/// When every label in the batch is a single character, labels that are not
/// field names are read as field initials.
fn outline(stanzas: &[Vec<Entry>], fields: &[String]) -> Result<Element> {
    let abbreviated = stanzas
        .iter()
        .flatten()
        .all(|e| e.label.chars().count() == 1);

    let mut items = Element::new("items");
    for stanza in stanzas {
        let mut item = Element::new("item");
        for entry in stanza {
            let field = resolve_label(&entry.label, fields, abbreviated)
                .ok_or_else(|| RowTreeError::decode(entry.line, format!("{}:", entry.label)))?;
            match item.child_mut(field) {
                Some(existing) => existing.set_text(escape(&entry.value)),
                None => item.push(Element::new(field).with_text(escape(&entry.value))),
            }
        }
        items.push(item);
    }
    Ok(items)
}

fn resolve_label<'f>(label: &str, fields: &'f [String], abbreviated: bool) -> Option<&'f str> {
    if let Some(f) = fields.iter().find(|f| f.as_str() == label) {
        return Some(f.as_str());
    }
    if abbreviated {
        return fields
            .iter()
            .find(|f| f.starts_with(label))
            .map(|f| f.as_str());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::number_lines;
    use pretty_assertions::assert_eq;

    fn fields() -> Vec<String> {
        vec!["name".into(), "telno".into(), "notes".into()]
    }

    #[test]
    fn test_decode_stanzas() {
        let text = "--+\nname: Bob\ntelno: 555\n\nname: Ann\nnotes: first line\n  second &amp; last\n";
        let rows = decode(&number_lines(text), &fields()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], ("name".to_string(), FieldValue::from("Bob")));
        assert_eq!(
            rows[1][1],
            ("notes".to_string(), FieldValue::from("first line\nsecond &amp; last"))
        );
    }

    #[test]
    fn test_single_character_labels() {
        let text = "--+\nn: Bob\nt: 555\n\nn: Ann\n";
        let rows = decode(&number_lines(text), &fields()).unwrap();
        assert_eq!(rows[0][1], ("telno".to_string(), FieldValue::from("555")));
        assert_eq!(rows[1][0].0, "name");
    }

    #[test]
    fn test_unknown_label() {
        let text = "--+\nname: Bob\nphone: 555\n";
        let err = decode(&number_lines(text), &fields()).unwrap_err();
        assert!(matches!(err, RowTreeError::Decode { line: 3, .. }));
    }

    #[test]
    fn test_nested_value_keeps_indentation() {
        let text = "--+\nname: Bob\nnotes: ---\n  pets:\n    - cat\n";
        let rows = decode(&number_lines(text), &fields()).unwrap();
        let FieldValue::Nested(value) = &rows[0][1].1 else {
            panic!("expected nested notes");
        };
        assert_eq!(value["pets"][0].as_str(), Some("cat"));
    }

    #[test]
    fn test_empty_line_inside_value() {
        let text = "--+\nnotes: a\n  \n  b\n\nname: Ann";
        let rows = decode(&number_lines(text), &fields()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].1, FieldValue::from("a\n\nb"));
    }
}
