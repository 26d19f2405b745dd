//! Text renderings of a record store.
//!
//! Each plain-text form here decodes back through the matching import
//! dialect. The markup form lives in [`crate::sync::rebuild`].

mod table;

pub use table::format_table;

use crate::decode::{is_heading, SECTION_SEPARATOR};
use crate::error::Result;
use crate::record::{FieldValue, Record};
use crate::schema::{element_name_for, Schema};
use crate::store::RecordStore;
use crate::sync::{Summary, RECORDS_ELEMENT, SUMMARY_ELEMENT};
use crate::template::FormatMask;
use crate::tree::{escape, Element, XmlOptions};
use serde_yaml::Value;

/// One line per record, shaped by `mask`.
pub fn delimited(store: &RecordStore, mask: &FormatMask) -> String {
    store
        .iter()
        .map(|record| mask.project(|field| record.get(field).map(FieldValue::encode)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `--+` stanzas. Blank fields are left out; continuation lines of
/// multi-line values are indented two spaces.
pub fn block(schema: &Schema, store: &RecordStore) -> String {
    let stanzas: Vec<String> = store
        .iter()
        .map(|record| stanza(schema, record))
        .filter(|s| !s.is_empty())
        .collect();
    let mut out = String::from("--+\n");
    out.push_str(&stanzas.join("\n\n"));
    out
}

fn stanza(schema: &Schema, record: &Record) -> String {
    let mut lines = Vec::new();
    for field in &schema.fields {
        let Some(value) = record.get(field).filter(|v| !v.is_blank()) else {
            continue;
        };
        let text = value.encode();
        let mut parts = text.split('\n');
        lines.push(format!("{field}: {}", parts.next().unwrap_or("")));
        lines.extend(parts.map(|part| format!("  {part}")));
    }
    lines.join("\n")
}

/// `--#` text: the first field of every record, one section each. Text that
/// does not open with a `# ` heading gets a bare `#` line in front.
pub fn section(schema: &Schema, store: &RecordStore) -> String {
    let first = schema.fields.first().map(String::as_str).unwrap_or("");
    let sections: Vec<String> = store
        .iter()
        .map(|record| {
            let text = record.text(first).trim().to_string();
            if is_heading(&text) && text.lines().next() != Some(SECTION_SEPARATOR) {
                text
            } else {
                format!("{SECTION_SEPARATOR}\n{text}")
            }
        })
        .collect();
    let mut out = String::from("--#\n");
    out.push_str(&sections.join("\n\n"));
    out
}

/// `---` YAML: a sequence of sequences in field order.
pub fn yaml(schema: &Schema, store: &RecordStore) -> Result<String> {
    let rows: Vec<Vec<Value>> = store
        .iter()
        .map(|record| {
            schema
                .fields
                .iter()
                .map(|f| record.get(f).map(FieldValue::to_yaml).unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    let body = serde_yaml::to_string(&rows)?;
    Ok(format!("---\n{}", body.trim_end()))
}

/// Column-aligned table of every field.
pub fn table(schema: &Schema, store: &RecordStore, header: bool) -> String {
    let rows: Vec<Vec<String>> = store
        .iter()
        .map(|record| {
            schema
                .fields
                .iter()
                .map(|f| record.text(f).into_owned())
                .collect()
        })
        .collect();
    let header = header.then_some(schema.fields.as_slice());
    format_table(header, &rows)
}

/// RSS 2.0 feed of the newest `limit` records (highest id first).
///
/// The channel title and description come from the summary's `title` and
/// `description` values when present.
pub fn rss(schema: &Schema, summary: &Summary, store: &RecordStore, limit: usize) -> String {
    let text_el = |name: &str, value: &str| Element::new(name).with_text(escape(value));

    let mut channel = Element::new("channel");
    let title = summary
        .get("title")
        .filter(|t| !t.is_empty())
        .unwrap_or(schema.root_name.as_str());
    channel.push(text_el("title", title));
    channel.push(text_el("description", summary.get("description").unwrap_or("")));
    if let Some(link) = summary.get("link").filter(|l| !l.is_empty()) {
        channel.push(text_el("link", link));
    }

    let mut records: Vec<&Record> = store.iter().collect();
    records.sort_by_key(|r| std::cmp::Reverse(r.id.parse::<u64>().unwrap_or(0)));
    for record in records.into_iter().take(limit) {
        let mut item = Element::new("item");
        if !schema.has_field("title") {
            let first = schema.fields.first().map(String::as_str).unwrap_or("");
            item.push(text_el("title", &record.text(first)));
        }
        for field in &schema.fields {
            item.push(text_el(&element_name_for(field), &record.text(field)));
        }
        if let Some(date) = rfc2822(&record.created) {
            item.push(text_el("pubDate", &date));
        }
        channel.push(item);
    }

    let mut rss = Element::new("rss").with_attr("version", "2.0");
    rss.push(channel);
    rss.to_xml(&XmlOptions {
        pretty: true,
        declaration: true,
        stylesheet: None,
    })
}

/// XSLT 1.0 stylesheet that shows the document's markup as an HTML page:
/// the summary as a definition list, then one table row per record.
pub fn xslt(schema: &Schema) -> String {
    let xsl = |name: &str| Element::new(format!("xsl:{name}"));
    let value_of = |path: &str| xsl("value-of").with_attr("select", path);
    let root = &schema.root_name;

    let mut title = Element::new("title");
    if schema.summary_fields.iter().any(|f| f == "title") {
        title.push(value_of(&format!("{root}/{SUMMARY_ELEMENT}/title")));
    } else {
        title.push_text(escape(root));
    }
    let mut head = Element::new("head");
    head.push(title);

    let mut header_row = Element::new("tr");
    for field in &schema.fields {
        header_row.push(Element::new("th").with_text(escape(field)));
    }
    let mut table = Element::new("table");
    table.push(header_row);
    table.push(xsl("apply-templates").with_attr(
        "select",
        format!("{root}/{RECORDS_ELEMENT}/{}", schema.record_name()),
    ));

    let mut body = Element::new("body");
    body.push(xsl("apply-templates").with_attr("select", format!("{root}/{SUMMARY_ELEMENT}")));
    body.push(table);

    let mut html = Element::new("html");
    html.push(head);
    html.push(body);
    let mut page = xsl("template").with_attr("match", "/");
    page.push(html);

    let mut list = Element::new("dl");
    for field in &schema.summary_fields {
        list.push(Element::new("dt").with_text(escape(field)));
        let mut value = Element::new("dd");
        value.push(value_of(field));
        list.push(value);
    }
    let mut summary = xsl("template").with_attr("match", SUMMARY_ELEMENT);
    summary.push(list);

    let mut row = Element::new("tr");
    for field in &schema.fields {
        let mut cell = Element::new("td");
        cell.push(value_of(&element_name_for(field)));
        row.push(cell);
    }
    let mut record = xsl("template").with_attr("match", schema.record_name());
    record.push(row);

    let mut stylesheet = xsl("stylesheet")
        .with_attr("version", "1.0")
        .with_attr("xmlns:xsl", "http://www.w3.org/1999/XSL/Transform");
    stylesheet.push(xsl("output").with_attr("method", "html").with_attr("indent", "yes"));
    stylesheet.push(page);
    stylesheet.push(summary);
    stylesheet.push(record);
    stylesheet.to_xml(&XmlOptions {
        pretty: true,
        declaration: true,
        stylesheet: None,
    })
}

fn rfc2822(timestamp: &str) -> Option<String> {
    chrono::DateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S %z")
        .ok()
        .map(|t| t.to_rfc2822())
}
