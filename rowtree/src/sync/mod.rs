//! Moving a document between its record store and its tree form.
//!
//! The tree looks like
//!
//! ```xml
//! <contacts>
//!   <summary><title>Mine</title><schema>contacts[title]/contact(name,telno)</schema>...</summary>
//!   <records>
//!     <contact id="1" created="..." last_modified=""><name>Bob</name><telno>555</telno></contact>
//!   </records>
//! </contacts>
//! ```
//!
//! [`load`] builds a store from such a tree, [`rebuild`] produces one from a
//! store. The external layout lists records in display order; the internal
//! layout, used for the cached tree behind path selection, keeps insertion
//! order.

mod summary;

pub use summary::*;

use crate::config::{parse_flag, DocumentOptions, Order};
use crate::error::Result;
use crate::identity;
use crate::record::{Body, FieldValue, Record};
use crate::schema::{
    element_name_for, field_name_for, parse_schema_with_key, Schema, SURROGATE_KEY_FIELD,
};
use crate::store::RecordStore;
use crate::tree::{escape_lenient, unescape, Element};

pub const SUMMARY_ELEMENT: &str = "summary";
pub const RECORDS_ELEMENT: &str = "records";

/// Record attributes managed by the store itself.
const IMPLICIT_ATTRIBUTES: &[&str] = &["id", "created", "last_modified"];

/// Record order within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Display order: reversed for descending documents
    External,
    /// Insertion order
    Internal,
}

/// Everything recovered from a tree.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub schema: Schema,
    pub options: DocumentOptions,
    pub summary: Summary,
    pub store: RecordStore,
}

/// Read a document tree. Values found in its summary override `base`.
pub fn load(root: &Element, base: &DocumentOptions, layout: Layout) -> Result<Loaded> {
    let mut summary = Summary::new();
    if let Some(el) = root.child(SUMMARY_ELEMENT) {
        for child in el.elements() {
            summary.set(field_name_for(&child.name), unescape(&child.text()));
        }
    }

    let mut options = base.clone();
    apply_summary(&mut options, &summary)?;

    let record_elements: Vec<&Element> = root
        .child(RECORDS_ELEMENT)
        .map(|r| r.elements().collect())
        .unwrap_or_default();
    let first = record_elements.first().copied();

    let raw = match summary.get(SCHEMA_KEY).filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw.to_string(),
        None => derive_schema(root, &summary, first),
    };
    let surrogate = options.default_key.as_deref() == Some(SURROGATE_KEY_FIELD)
        || first.map_or(false, |r| r.child(SURROGATE_KEY_FIELD).is_some());
    let explicit_key = options
        .default_key
        .as_deref()
        .filter(|k| *k != SURROGATE_KEY_FIELD);
    let mut schema = parse_schema_with_key(&raw, explicit_key)?;
    if !schema.has_records() {
        if let Some(record) = first {
            schema.record_name = Some(record.name.clone());
            schema.fields = record
                .elements()
                .map(|c| field_name_for(&c.name).to_string())
                .filter(|f| f != SURROGATE_KEY_FIELD)
                .collect();
        }
    }
    if surrogate {
        schema.promote_surrogate_key();
    }

    let mut records = read_records(&record_elements, &schema)?;
    if has_repeated_keys(&records) {
        log::warn!("document has repeated keys, numbering records with '{SURROGATE_KEY_FIELD}'");
        schema.promote_surrogate_key();
        for (i, record) in records.iter_mut().enumerate() {
            record.key = (i + 1).to_string();
            record
                .body
                .insert(SURROGATE_KEY_FIELD.to_string(), FieldValue::Text(record.key.clone()));
        }
    }

    if layout == Layout::External && options.order == Order::Descending {
        records.reverse();
    }
    let mut store = RecordStore::new(options.order);
    for record in records {
        store.push_loaded(record);
    }

    write_config(&mut summary, &schema, &options);
    log::info!(
        "loaded '{}' with {} records ({} order)",
        schema.root_name,
        store.len(),
        options.order
    );
    Ok(Loaded {
        schema,
        options,
        summary,
        store,
    })
}

/// Apply configuration values persisted in a summary.
pub fn apply_summary(options: &mut DocumentOptions, summary: &Summary) -> Result<()> {
    if let Some(mask) = summary.get(FORMAT_MASK_KEY).filter(|m| !m.is_empty()) {
        options.format_mask = Some(mask.to_string());
    }
    if let Some(delimiter) = summary.get(DELIMITER_KEY).filter(|d| !d.is_empty()) {
        options.delimiter = delimiter.to_string();
    }
    if let Some(order) = summary.get(ORDER_KEY).filter(|o| !o.trim().is_empty()) {
        options.order = order.parse()?;
    }
    if let Some(unique) = summary.get(UNIQUE_KEY) {
        options.unique = parse_flag(UNIQUE_KEY, unique)?;
    }
    if let Some(key) = summary.get(DEFAULT_KEY_KEY).filter(|k| !k.trim().is_empty()) {
        options.default_key = Some(key.trim().to_string());
    }
    Ok(())
}

/// Record the effective configuration in the summary. Declared summary
/// fields are added (empty) when missing; existing entries keep their place.
pub fn write_config(summary: &mut Summary, schema: &Schema, options: &DocumentOptions) {
    for field in &schema.summary_fields {
        if summary.get(field).is_none() {
            summary.set(field, "");
        }
    }
    summary.set(SCHEMA_KEY, schema.raw.clone());
    summary.set(DEFAULT_KEY_KEY, schema.default_key().unwrap_or(""));
    summary.set(FORMAT_MASK_KEY, effective_mask(schema, options));
    summary.set(DELIMITER_KEY, options.delimiter.clone());
    summary.set(ORDER_KEY, options.order.as_str());
    summary.set(UNIQUE_KEY, options.unique.to_string());
}

/// The configured format mask, or one placeholder per field joined by the
/// delimiter.
pub fn effective_mask(schema: &Schema, options: &DocumentOptions) -> String {
    options
        .format_mask
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| schema.default_format_mask(&options.delimiter))
}

/// Build the tree for `store`.
pub fn rebuild(schema: &Schema, summary: &Summary, store: &RecordStore, layout: Layout) -> Element {
    let mut summary_el = Element::new(SUMMARY_ELEMENT);
    for (key, value) in summary.iter() {
        summary_el.push(Element::new(key).with_text(encode_text(value)));
    }

    let mut records_el = Element::new(RECORDS_ELEMENT);
    let records: Box<dyn Iterator<Item = &Record>> = match layout {
        Layout::External => store.iter(),
        Layout::Internal => Box::new(store.iter_insertion()),
    };
    for record in records {
        records_el.push(record_element(schema, record));
    }

    let mut root = Element::new(&schema.root_name);
    root.push(summary_el);
    root.push(records_el);
    root
}

/// One record element.
pub fn record_element(schema: &Schema, record: &Record) -> Element {
    let mut el = Element::new(schema.record_name())
        .with_attr("id", &record.id)
        .with_attr("created", &record.created)
        .with_attr("last_modified", &record.last_modified);
    for (name, value) in &record.attributes {
        el.set_attr(name, value.clone());
    }
    for (field, value) in &record.body {
        el.push(Element::new(element_name_for(field)).with_text(encode_text(&value.encode())));
    }
    el
}

/// Lenient escaping, with whitespace-only values written as character
/// references so they survive parsing.
fn encode_text(value: &str) -> String {
    if !value.is_empty() && value.trim().is_empty() {
        return value.chars().map(|c| format!("&#{};", c as u32)).collect();
    }
    escape_lenient(value)
}

fn read_records(elements: &[&Element], schema: &Schema) -> Result<Vec<Record>> {
    let key_field = schema.default_key();
    let mut next = identity::max_id(elements.iter().filter_map(|e| e.attr("id")));

    let mut records = Vec::with_capacity(elements.len());
    for el in elements {
        let id = match el.attr("id").filter(|id| !id.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => {
                next = identity::offset(next, 1)?;
                next.to_string()
            }
        };

        let mut body = Body::new();
        for field in &schema.fields {
            let raw = el
                .child(&element_name_for(field))
                .map(|c| unescape(&c.text()))
                .unwrap_or_default();
            body.insert(field.clone(), FieldValue::decode(&raw)?);
        }

        let key = key_field
            .and_then(|k| body.get(k))
            .map(|v| v.encode().into_owned())
            .unwrap_or_else(|| id.clone());
        let attributes = el
            .attributes
            .iter()
            .filter(|(k, _)| !IMPLICIT_ATTRIBUTES.contains(&k.as_str()))
            .cloned()
            .collect();

        records.push(Record {
            key,
            created: el.attr("created").unwrap_or_default().to_string(),
            last_modified: el.attr("last_modified").unwrap_or_default().to_string(),
            id,
            attributes,
            body,
        });
    }
    Ok(records)
}

fn has_repeated_keys(records: &[Record]) -> bool {
    let mut seen = std::collections::HashSet::new();
    records.iter().any(|r| !seen.insert(r.key.as_str()))
}

/// Schema string for a tree that does not carry one.
fn derive_schema(root: &Element, summary: &Summary, first: Option<&Element>) -> String {
    let summary_fields: Vec<&str> = summary.custom().map(|(k, _)| k).collect();
    let mut raw = root.name.clone();
    if !summary_fields.is_empty() {
        raw.push_str(&format!("[{}]", summary_fields.join(",")));
    }
    if let Some(record) = first {
        let fields: Vec<&str> = record
            .elements()
            .map(|c| field_name_for(&c.name))
            .filter(|f| *f != SURROGATE_KEY_FIELD)
            .collect();
        if !fields.is_empty() {
            raw.push_str(&format!("/{}({})", record.name, fields.join(",")));
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema_str;
    use crate::store::body_from_pairs;
    use crate::tree::{parse, XmlOptions};
    use pretty_assertions::assert_eq;

    fn sample(order: Order) -> (Schema, Summary, RecordStore, DocumentOptions) {
        let schema = parse_schema_str("contacts[title]/contact(name,telno,id)").unwrap();
        let options = DocumentOptions {
            order,
            ..DocumentOptions::default()
        };
        let mut summary = Summary::new();
        summary.set("title", "Friends & family");
        write_config(&mut summary, &schema, &options);

        let mut store = RecordStore::new(order);
        for (name, telno) in [("Bob", "555 <home>"), ("Ann", "556")] {
            let body = body_from_pairs(&schema.fields, [("name", name), ("telno", telno), ("id", "x")]);
            store.insert(name.to_string(), body, None).unwrap();
        }
        (schema, summary, store, options)
    }

    fn names(store: &RecordStore) -> Vec<String> {
        store.iter().map(|r| r.text("name").into_owned()).collect()
    }

    #[test]
    fn test_rebuild_then_load() {
        let (schema, summary, store, _) = sample(Order::Ascending);
        let xml = rebuild(&schema, &summary, &store, Layout::External).to_xml(&XmlOptions::default());
        assert!(xml.contains("<title>Friends & family</title>"));
        assert!(xml.contains("<telno>555 &lt;home&gt;</telno>"));
        assert!(xml.contains("<_id>x</_id>"));

        let loaded = load(&parse(&xml).unwrap(), &DocumentOptions::default(), Layout::External).unwrap();
        assert_eq!(loaded.schema, schema);
        assert_eq!(loaded.summary.get("title"), Some("Friends & family"));
        assert_eq!(loaded.summary.get(DELIMITER_KEY), Some(" "));
        assert_eq!(names(&loaded.store), vec!["Bob", "Ann"]);
        let bob = loaded.store.get("Bob").unwrap();
        assert_eq!(bob.id, "1");
        assert_eq!(bob.text("telno"), "555 <home>");
        assert_eq!(bob.text("id"), "x");
        assert!(!loaded.store.is_dirty());
    }

    #[test]
    fn test_descending_layouts() {
        let (schema, summary, store, _) = sample(Order::Descending);
        assert_eq!(names(&store), vec!["Ann", "Bob"]);

        let external = rebuild(&schema, &summary, &store, Layout::External);
        let first = external.select_first("records/contact").unwrap().unwrap();
        assert_eq!(first.attr("id"), Some("2"));
        let loaded = load(&external, &DocumentOptions::default(), Layout::External).unwrap();
        assert_eq!(loaded.options.order, Order::Descending);
        assert_eq!(names(&loaded.store), vec!["Ann", "Bob"]);

        let internal = rebuild(&schema, &summary, &store, Layout::Internal);
        let first = internal.select_first("records/contact").unwrap().unwrap();
        assert_eq!(first.attr("id"), Some("1"));
        let loaded = load(&internal, &DocumentOptions::default(), Layout::Internal).unwrap();
        assert_eq!(names(&loaded.store), vec!["Ann", "Bob"]);
    }

    #[test]
    fn test_load_without_summary() {
        let xml = "<notes><records><note id='4'><title>a</title></note><note><title>b</title></note></records></notes>";
        let loaded = load(&parse(xml).unwrap(), &DocumentOptions::default(), Layout::External).unwrap();
        assert_eq!(loaded.schema.raw, "notes/note(title)");
        let ids: Vec<&str> = loaded.store.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "5"]);
        assert_eq!(loaded.summary.get(SCHEMA_KEY), Some("notes/note(title)"));
    }

    #[test]
    fn test_summary_only_schema_takes_fields_from_records() {
        let xml = "<log><summary><schema>log[owner]</schema></summary>\
                   <records><entry id='1'><day>mon</day><note>ran</note></entry></records></log>";
        let loaded = load(&parse(xml).unwrap(), &DocumentOptions::default(), Layout::External).unwrap();
        assert_eq!(loaded.schema.fields, vec!["day", "note"]);
        assert_eq!(loaded.schema.record_name(), "entry");
        assert!(loaded.store.contains_key("mon"));
    }

    #[test]
    fn test_surrogate_key_is_restored() {
        let xml = "<log><summary><schema>log/entry(day)</schema><default_key>uid</default_key></summary>\
                   <records><entry id='1'><day>mon</day><uid>1</uid></entry>\
                   <entry id='2'><day>mon</day><uid>2</uid></entry></records></log>";
        let loaded = load(&parse(xml).unwrap(), &DocumentOptions::default(), Layout::External).unwrap();
        assert_eq!(loaded.schema.default_key(), Some(SURROGATE_KEY_FIELD));
        assert_eq!(loaded.store.len(), 2);
        assert!(loaded.store.contains_key("2"));
    }

    #[test]
    fn test_summary_overrides_base_options() {
        let base = DocumentOptions {
            delimiter: ",".into(),
            ..DocumentOptions::default()
        };
        let xml = "<n><summary><schema>n/i(a,b)</schema><delimiter>;</delimiter><unique>true</unique></summary></n>";
        let loaded = load(&parse(xml).unwrap(), &base, Layout::External).unwrap();
        assert_eq!(loaded.options.delimiter, ";");
        assert!(loaded.options.unique);
        assert_eq!(loaded.summary.get(FORMAT_MASK_KEY), Some("[!a];[!b]"));
    }
}
