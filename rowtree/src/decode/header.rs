// Header pragma and summary block

use super::Line;
use crate::error::{Result, RowTreeError};
use crate::tree::unescape;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PRAGMA: Regex = Regex::new(r"^\s*<\?([\w-]+)\s*(.*?)\s*\?>\s*$").unwrap();
    static ref PRAGMA_ATTR: Regex =
        Regex::new(r#"([\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref SUMMARY_LINE: Regex = Regex::new(r"^(\w+):\s*(.*)$").unwrap();
}

/// A `<?name attr="value" ...?>` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pragma {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

/// Split an optional header pragma off `text`, numbering the remaining lines.
///
/// Only the first non-blank line is considered, and `<?xml ...?>` is never a
/// pragma. Anything between the name and `?>` that is not `attr="value"`
/// is an error.
pub fn split_pragma(text: &str) -> Result<(Option<Pragma>, Vec<Line<'_>>)> {
    let lines = super::number_lines(text);
    let Some(pos) = lines.iter().position(|(_, l)| !l.trim().is_empty()) else {
        return Ok((None, lines));
    };

    let (number, first) = lines[pos];
    let Some(caps) = PRAGMA.captures(first) else {
        return Ok((None, lines));
    };
    let name = caps[1].to_string();
    if name.eq_ignore_ascii_case("xml") {
        return Ok((None, lines));
    }

    let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    if !PRAGMA_ATTR.replace_all(body, "").trim().is_empty() {
        return Err(RowTreeError::decode(number, first));
    }
    let attributes: Vec<(String, String)> = PRAGMA_ATTR
        .captures_iter(body)
        .map(|attr| {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|m| m.as_str())
                .unwrap_or("");
            (attr[1].to_string(), unescape(value))
        })
        .collect();

    log::debug!("header pragma <?{name}?> with {} attributes", attributes.len());
    Ok((Some(Pragma { name, attributes }), lines[pos + 1..].to_vec()))
}

/// Split the leading `label: value` summary lines off `lines`.
///
/// Only labels named in `summary_fields` count; blank lines inside the block
/// are skipped and the block ends at the first other line.
pub fn split_summary<'l, 'a>(
    lines: &'l [Line<'a>],
    summary_fields: &[String],
) -> (Vec<(String, String)>, &'l [Line<'a>]) {
    let mut summary = Vec::new();
    let mut rest = 0;
    for (i, (_, line)) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = SUMMARY_LINE.captures(line) else {
            break;
        };
        if !summary_fields.iter().any(|f| f == &caps[1]) {
            break;
        }
        summary.push((caps[1].to_string(), caps[2].trim_end().to_string()));
        rest = i + 1;
    }
    (summary, &lines[rest..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_pragma() {
        let text = "<?rowtree schema=\"notes/note(title)\" order='descending'?>\nhello\nworld";
        let (pragma, lines) = split_pragma(text).unwrap();
        let pragma = pragma.unwrap();
        assert_eq!(pragma.name, "rowtree");
        assert_eq!(
            pragma.attributes,
            vec![
                ("schema".to_string(), "notes/note(title)".to_string()),
                ("order".to_string(), "descending".to_string())
            ]
        );
        assert_eq!(lines, vec![(2, "hello"), (3, "world")]);
    }

    #[test]
    fn test_split_pragma_unescapes_values() {
        let (pragma, _) = split_pragma("<?rowtree format_mask=\"[!a] &amp; [!b]\"?>").unwrap();
        assert_eq!(pragma.unwrap().attributes[0].1, "[!a] & [!b]");
    }

    #[test]
    fn test_no_pragma() {
        let (pragma, lines) = split_pragma("a b\nc d").unwrap();
        assert!(pragma.is_none());
        assert_eq!(lines.len(), 2);

        let (pragma, _) = split_pragma("<?xml version=\"1.0\"?>\n<a/>").unwrap();
        assert!(pragma.is_none());
    }

    #[test]
    fn test_malformed_pragma() {
        let err = split_pragma("\n<?rowtree schema=notes?>\nx").unwrap_err();
        assert!(matches!(err, RowTreeError::Decode { line: 2, .. }));
    }

    #[test]
    fn test_split_summary() {
        let lines = vec![(1, "title: Mine"), (2, ""), (3, "Bob 55"), (4, "title: x")];
        let (summary, rest) = split_summary(&lines, &["title".to_string()]);
        assert_eq!(summary, vec![("title".to_string(), "Mine".to_string())]);
        assert_eq!(rest, &lines[1..]);

        let (summary, rest) = split_summary(&lines[2..], &["title".to_string()]);
        assert!(summary.is_empty());
        assert_eq!(rest.len(), 2);
    }
}
