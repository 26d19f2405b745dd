// Line dialect: one record per line, shaped by the format mask

use super::{Line, RawRow};
use crate::error::{Result, RowTreeError};
use crate::record::FieldValue;
use crate::source;
use crate::template::FormatMask;

/// Decode every non-blank, non-comment line with `mask`.
///
/// In linked mode each captured value names a location whose contents
/// become the field value.
pub fn decode(lines: &[Line<'_>], mask: &FormatMask, linked: bool) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    for &(number, line) in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        // Trailing delimiters belong to blank trailing fields
        let pairs = mask
            .extract(line)
            .ok_or_else(|| RowTreeError::decode(number, line))?;

        let mut row = RawRow::with_capacity(pairs.len());
        for (field, value) in pairs {
            let value = if linked {
                let content = source::read_location(value.trim())?;
                FieldValue::decode(content.trim_end())?
            } else {
                FieldValue::decode(&value)?
            };
            row.push((field, value));
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::number_lines;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_lines() {
        let mask = FormatMask::parse("[!name] [!age] [!dob]").unwrap();
        let lines = number_lines("# people\nBob 43 1981-03-02\n\nAnn 29 &lt;unknown&gt;\n");
        let rows = decode(&lines, &mask, false).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            vec![
                ("name".to_string(), FieldValue::from("Ann")),
                ("age".to_string(), FieldValue::from("29")),
                ("dob".to_string(), FieldValue::from("<unknown>")),
            ]
        );
    }

    #[test]
    fn test_last_field_takes_the_rest() {
        let mask = FormatMask::parse("[!name] [!note]").unwrap();
        let rows = decode(&number_lines("Bob likes tea"), &mask, false).unwrap();
        assert_eq!(rows[0][1].1, FieldValue::from("likes tea"));
    }

    #[test]
    fn test_blank_trailing_fields() {
        let mask = FormatMask::parse("[!name] [!age] [!dob]").unwrap();
        let rows = decode(&number_lines("Bob  \nAnn 29 "), &mask, false).unwrap();
        assert_eq!(rows[0][0].1, FieldValue::from("Bob"));
        assert_eq!(rows[0][1].1, FieldValue::from(""));
        assert_eq!(rows[0][2].1, FieldValue::from(""));
        assert_eq!(rows[1][1].1, FieldValue::from("29"));
        assert_eq!(rows[1][2].1, FieldValue::from(""));
    }

    #[test]
    fn test_mismatch_names_the_line() {
        let mask = FormatMask::parse("[!name], [!age]").unwrap();
        let err = decode(&number_lines("Bob, 4\n\nno comma here"), &mask, false).unwrap_err();
        assert!(matches!(err, RowTreeError::Decode { line: 3, ref text } if text == "no comma here"));
    }

    #[test]
    fn test_linked_values_are_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let note = dir.path().join("note.txt");
        std::fs::write(&note, "---\n- red\n- blue\n").unwrap();

        let mask = FormatMask::parse("[!name] [!colours]").unwrap();
        let text = format!("Bob {}", note.display());
        let rows = decode(&number_lines(&text), &mask, true);
        // the name column is a location too
        assert!(matches!(rows, Err(RowTreeError::SourceUnavailable { .. })));

        let mask = FormatMask::parse("[!colours]").unwrap();
        let rows = decode(&number_lines(&note.display().to_string()), &mask, true).unwrap();
        assert!(matches!(rows[0][0].1, FieldValue::Nested(_)));
    }
}
