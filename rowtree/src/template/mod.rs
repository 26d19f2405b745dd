// Format masks - `[!field]` placeholders projected to text and back

use crate::error::{Result, RowTreeError};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\[!(\w+)\]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed format mask such as `[!name] [!age] [!dob]`.
#[derive(Debug, Clone)]
pub struct FormatMask {
    raw: String,
    segments: Vec<Segment>,
    pattern: Regex,
}

impl FormatMask {
    pub fn parse(mask: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(mask) {
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            if m.0 > last {
                segments.push(Segment::Literal(mask[last..m.0].to_string()));
            }
            segments.push(Segment::Field(caps[1].to_string()));
            last = m.1;
        }
        if last < mask.len() {
            segments.push(Segment::Literal(mask[last..].to_string()));
        }

        let field_count = segments
            .iter()
            .filter(|s| matches!(s, Segment::Field(_)))
            .count();
        if field_count == 0 {
            return Err(RowTreeError::Config(format!(
                "format mask '{mask}' has no [!field] placeholders"
            )));
        }

        // Every capture but the last stops at the first delimiter it can
        let mut pattern = String::from("^");
        let mut seen = 0;
        for segment in &segments {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Field(_) => {
                    seen += 1;
                    pattern.push_str(if seen == field_count { "(.*)" } else { "(.*?)" });
                }
            }
        }
        pattern.push('$');

        Ok(FormatMask {
            raw: mask.to_string(),
            segments,
            pattern: Regex::new(&pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Field names in placeholder order.
    pub fn fields(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(f) => Some(f.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Match one line, returning `(field, value)` pairs in placeholder order.
    pub fn extract(&self, line: &str) -> Option<Vec<(String, String)>> {
        let caps = self.pattern.captures(line)?;
        Some(
            self.fields()
                .into_iter()
                .enumerate()
                .map(|(i, f)| {
                    let value = caps.get(i + 1).map(|m| m.as_str()).unwrap_or("");
                    (f.to_string(), value.to_string())
                })
                .collect(),
        )
    }

    /// Substitute field values into the mask; unknown fields render empty.
    pub fn project<'v, F>(&self, mut value_of: F) -> String
    where
        F: FnMut(&str) -> Option<std::borrow::Cow<'v, str>>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(f) => {
                    if let Some(v) = value_of(f) {
                        out.push_str(&v);
                    }
                }
            }
        }
        out
    }
}

/// Replace every whitespace run between placeholders with `delimiter`.
pub fn with_delimiter(mask: &str, delimiter: &str) -> String {
    lazy_static! {
        static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    }
    WHITESPACE.replace_all(mask, regex::NoExpand(delimiter)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_extract_space_delimited() {
        let mask = FormatMask::parse("[!name] [!age] [!dob]").unwrap();
        let row = mask.extract("Tracy 37 15 Jun 1972").unwrap();
        assert_eq!(
            row,
            vec![
                ("name".to_string(), "Tracy".to_string()),
                ("age".to_string(), "37".to_string()),
                ("dob".to_string(), "15 Jun 1972".to_string()),
            ]
        );
        assert!(mask.extract("Tracy").is_none());
    }

    #[test]
    fn test_extract_with_literals() {
        let mask = FormatMask::parse("[!name] <[!email]> ([!telno])").unwrap();
        let row = mask.extract("Jo Bloggs <jo@example.com> (0131 555)").unwrap();
        assert_eq!(row[0].1, "Jo Bloggs");
        assert_eq!(row[1].1, "jo@example.com");
        assert_eq!(row[2].1, "0131 555");
    }

    #[test]
    fn test_project() {
        let mask = FormatMask::parse("[!name],[!age]").unwrap();
        let text = mask.project(|f| match f {
            "name" => Some(Cow::Borrowed("Bob")),
            _ => None,
        });
        assert_eq!(text, "Bob,");
    }

    #[test]
    fn test_with_delimiter() {
        assert_eq!(with_delimiter("[!a] [!b]  [!c]", " | "), "[!a] | [!b] | [!c]");
    }

    #[test]
    fn test_mask_without_placeholders() {
        assert!(matches!(FormatMask::parse("plain"), Err(RowTreeError::Config(_))));
    }
}
