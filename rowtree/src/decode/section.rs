// Section dialect: free text split at top-level `#` headings

use super::{Line, RawRow};
use crate::error::{Result, RowTreeError};
use crate::record::FieldValue;

/// Each section, heading line included, becomes the first field of a row.
/// A bare `#` line only separates sections and is dropped.
pub fn decode(lines: &[Line<'_>], fields: &[String]) -> Result<Vec<RawRow>> {
    let first = fields
        .first()
        .ok_or_else(|| RowTreeError::Config("section import needs at least one field".into()))?;

    let mut sections: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut seen_marker = false;
    for &(_, line) in lines {
        if !seen_marker && line.trim().starts_with("--#") {
            seen_marker = true;
            continue;
        }
        if is_heading(line) && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        if line.trim_end() != SEPARATOR {
            current.push(line);
        }
    }
    sections.push(current);

    sections
        .into_iter()
        .map(|section| section.join("\n").trim().to_string())
        .filter(|text| !text.is_empty())
        .map(|text| -> Result<RawRow> { Ok(vec![(first.clone(), FieldValue::decode(&text)?)]) })
        .collect()
}

/// Line written before a section that has no heading of its own.
pub const SEPARATOR: &str = "#";

/// A line opening a section: exactly one `#`.
pub fn is_heading(line: &str) -> bool {
    line.starts_with('#') && !line.starts_with("##")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::number_lines;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_sections() {
        let text = "--#\n# Monday\nwalked\n## detail\nfar\n\n# Tuesday\nrested\n";
        let rows = decode(&number_lines(text), &["entry".to_string()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].1, FieldValue::from("# Monday\nwalked\n## detail\nfar"));
        assert_eq!(rows[1][0], ("entry".to_string(), FieldValue::from("# Tuesday\nrested")));
    }

    #[test]
    fn test_bare_separator_splits_and_is_dropped() {
        let rows = decode(&number_lines("--#\n#\nran\n\n#\nswam\n\n# Sun\nrest"), &["entry".to_string()]).unwrap();
        let texts: Vec<String> = rows.iter().map(|r| r[0].1.encode().into_owned()).collect();
        assert_eq!(texts, vec!["ran", "swam", "# Sun\nrest"]);
    }

    #[test]
    fn test_text_before_first_heading() {
        let rows = decode(&number_lines("--#\npreamble\n# One"), &["entry".to_string()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].1, FieldValue::from("preamble"));
    }
}
