//! The document handle.
//!
//! A [`Document`] owns the parsed schema, the options, the summary and the
//! record store, plus a cached tree rebuilt lazily from the store. Every
//! mutation marks the store dirty; every read calls `ensure_fresh` first, so
//! the cached tree is only rebuilt when something has changed.

mod settings;

use self::settings::{Settings, STYLESHEET_KEY};
use crate::config::{DocumentOptions, Order, OutputFormat};
use crate::decode::{self, DecodeSettings};
use crate::error::{Result, RowTreeError};
use crate::identity;
use crate::query::{FieldIndex, FieldQuery};
use crate::record::{Body, FieldValue, Record};
use crate::render;
use crate::schema::{is_valid_name, parse_schema_with_key, Schema, SURROGATE_KEY_FIELD};
use crate::source::{self, LocationKind};
use crate::store::{MergeReport, RecordStore};
use crate::sync::{self, Layout, Summary, CONFIG_KEYS, DEFAULT_KEY_KEY, RECORDS_ELEMENT};
use crate::template::FormatMask;
use crate::tree::{self, Element, XmlOptions};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// A schema-described record collection, held both as a keyed record map and
/// as a tree document.
#[derive(Debug)]
pub struct Document {
    schema: Schema,
    options: DocumentOptions,
    summary: Summary,
    store: RecordStore,
    /// Internal-layout tree, valid while the store is clean
    tree: RefCell<Element>,
    /// Exact-value lookups, cleared along with the tree
    index: RefCell<FieldIndex>,
    path: Option<PathBuf>,
}

impl Document {
    // ── Construction ────────────────────────────────────────────────

    /// Empty document for a schema string such as
    /// `contacts[title]/contact(name,age,dob)`.
    pub fn new(schema: &str) -> Result<Self> {
        Self::with_options(schema, DocumentOptions::default())
    }

    pub fn with_options(schema: &str, options: DocumentOptions) -> Result<Self> {
        let surrogate = options.default_key.as_deref() == Some(SURROGATE_KEY_FIELD);
        let explicit_key = options.default_key.as_deref().filter(|_| !surrogate);
        let mut schema = parse_schema_with_key(schema, explicit_key)?;
        if surrogate {
            schema.promote_surrogate_key();
        }
        if let Some(mask) = &options.format_mask {
            FormatMask::parse(mask)?;
        }

        let mut summary = Summary::new();
        sync::write_config(&mut summary, &schema, &options);
        let store = RecordStore::new(options.order);
        log::debug!("new document '{}'", schema.raw);
        Ok(Self::assemble(schema, options, summary, store))
    }

    /// Load a document from its markup.
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_xml_with(xml, DocumentOptions::default())
    }

    pub fn from_xml_with(xml: &str, options: DocumentOptions) -> Result<Self> {
        let root = tree::parse(xml)?;
        let loaded = sync::load(&root, &options, Layout::External)?;
        Ok(Self::assemble(
            loaded.schema,
            loaded.options,
            loaded.summary,
            loaded.store,
        ))
    }

    /// Open a document from markup, a schema string, a URL or a file path.
    ///
    /// Text that is not markup must start with a header pragma naming its
    /// schema; it is then imported into a new document.
    pub fn open(location: &str) -> Result<Self> {
        Self::open_with(location, DocumentOptions::default())
    }

    pub fn open_with(location: &str, options: DocumentOptions) -> Result<Self> {
        if location.contains('<') {
            return Self::from_xml_with(location, options);
        }
        let kind = source::kind_of(location);
        if kind == LocationKind::File && (location.contains('[') || location.contains('(')) {
            return Self::with_options(location, options);
        }

        let content = source::read_location(location)?;
        let mut document = Self::from_text(&content, options)?;
        if kind == LocationKind::File {
            document.path = Some(PathBuf::from(location));
        }
        log::info!("opened {location} ({} records)", document.len());
        Ok(document)
    }

    fn from_text(content: &str, options: DocumentOptions) -> Result<Self> {
        let (pragma, _) = decode::split_pragma(content)?;
        let schema = pragma
            .as_ref()
            .and_then(|p| p.attributes.iter().find(|(k, _)| k == sync::SCHEMA_KEY))
            .map(|(_, v)| v.clone());
        match schema {
            Some(schema) => {
                let mut document = Self::with_options(&schema, options)?;
                document.import(content)?;
                Ok(document)
            }
            None if content.trim_start().starts_with('<') => Self::from_xml_with(content, options),
            None => Err(RowTreeError::Config(
                "document text is neither markup nor headed by a schema pragma".into(),
            )),
        }
    }

    fn assemble(schema: Schema, options: DocumentOptions, summary: Summary, store: RecordStore) -> Self {
        let tree = sync::rebuild(&schema, &summary, &store, Layout::Internal);
        store.mark_clean();
        Document {
            schema,
            options,
            summary,
            store,
            tree: RefCell::new(tree),
            index: RefCell::default(),
            path: None,
        }
    }

    // ── Freshness ───────────────────────────────────────────────────

    /// Rebuild the cached tree if the store changed since the last rebuild.
    fn ensure_fresh(&self) {
        if self.store.is_dirty() {
            log::debug!("rebuilding tree for {} records", self.store.len());
            *self.tree.borrow_mut() =
                sync::rebuild(&self.schema, &self.summary, &self.store, Layout::Internal);
            self.store.mark_clean();
            self.index.borrow_mut().clear();
        }
    }

    /// Replace store, schema and summary from an edited internal tree.
    fn reload(&mut self, tree: Element) -> Result<()> {
        let loaded = sync::load(&tree, &self.options, Layout::Internal)?;
        self.schema = loaded.schema;
        self.options = loaded.options;
        self.summary = loaded.summary;
        self.store = loaded.store;
        *self.tree.borrow_mut() = tree;
        self.index.borrow_mut().clear();
        Ok(())
    }

    // ── Configuration ───────────────────────────────────────────────

    fn settings(&self) -> Settings {
        Settings {
            schema: self.schema.clone(),
            options: self.options.clone(),
        }
    }

    /// Adopt new settings. A new schema starts the document over.
    fn install(&mut self, settings: Settings) {
        if settings.schema.raw != self.schema.raw {
            log::info!("schema changed to '{}', clearing records", settings.schema.raw);
            self.store.clear();
            self.summary = Summary::new();
        }
        self.store.set_order(settings.options.order);
        self.schema = settings.schema;
        self.options = settings.options;
        sync::write_config(&mut self.summary, &self.schema, &self.options);
        self.store.mark_dirty();
    }

    fn configure(&mut self, name: &str, value: &str) -> Result<()> {
        let mut settings = self.settings();
        settings.apply(name, value)?;
        if name == DEFAULT_KEY_KEY {
            if let Some(key) = settings.schema.default_key() {
                self.store.rekey(key)?;
            }
        }
        self.install(settings);
        Ok(())
    }

    /// Change the field separator; whitespace runs in the mask become
    /// `delimiter`.
    pub fn set_delimiter(&mut self, delimiter: &str) {
        let mut settings = self.settings();
        settings.set_delimiter(delimiter);
        self.install(settings);
    }

    pub fn set_format_mask(&mut self, mask: &str) -> Result<()> {
        self.configure(sync::FORMAT_MASK_KEY, mask)
    }

    pub fn set_order(&mut self, order: Order) {
        let mut settings = self.settings();
        settings.options.order = order;
        self.install(settings);
    }

    /// Start over with a new schema; existing records are dropped.
    pub fn set_schema(&mut self, schema: &str) -> Result<()> {
        self.configure(sync::SCHEMA_KEY, schema)
    }

    /// Key records by `field` instead. Fails if the field's values repeat.
    pub fn set_default_key(&mut self, field: &str) -> Result<()> {
        self.configure(DEFAULT_KEY_KEY, field)
    }

    pub fn set_unique(&mut self, unique: bool) {
        let mut settings = self.settings();
        settings.options.unique = unique;
        self.install(settings);
    }

    pub fn set_linked(&mut self, linked: bool) {
        self.options.linked = linked;
    }

    pub fn set_stylesheet(&mut self, href: Option<&str>) -> Result<()> {
        self.configure(STYLESHEET_KEY, href.unwrap_or(""))
    }

    pub fn set_output(&mut self, output: OutputFormat) {
        self.options.output = output;
    }

    pub fn set_pretty(&mut self, pretty: bool) {
        self.options.pretty = pretty;
    }

    /// Set a summary entry. Configuration entries (`order`, `delimiter`, ...)
    /// are applied as settings.
    pub fn set_summary_value(&mut self, key: &str, value: &str) -> Result<()> {
        if CONFIG_KEYS.contains(&key) {
            return self.configure(key, value);
        }
        if !is_valid_name(key) {
            return Err(RowTreeError::Config(format!("'{key}' is not a valid summary name")));
        }
        self.summary.set(key, value);
        self.store.mark_dirty();
        Ok(())
    }

    // ── Mutation ────────────────────────────────────────────────────

    /// Add a record. Fields outside the schema are ignored.
    pub fn create<I, K, V>(&mut self, fields: I) -> Result<&Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.create_record(fields, None)
    }

    /// Add a record with a caller-chosen id.
    pub fn create_with_id<I, K, V>(&mut self, fields: I, id: &str) -> Result<&Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        self.create_record(fields, Some(id.to_string()))
    }

    /// Add a record from one line shaped like the format mask.
    pub fn create_from_line(&mut self, line: &str) -> Result<&Record> {
        let mask = FormatMask::parse(&sync::effective_mask(&self.schema, &self.options))?;
        let pairs = mask
            .extract(line.trim_end_matches(['\r', '\n']))
            .ok_or_else(|| RowTreeError::decode(1, line))?;
        let mut fields = Vec::with_capacity(pairs.len());
        for (field, value) in pairs {
            fields.push((field, FieldValue::decode(&value)?));
        }
        self.create(fields)
    }

    fn create_record<I, K, V>(&mut self, fields: I, id: Option<String>) -> Result<&Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let key_field = self
            .schema
            .default_key()
            .ok_or_else(|| RowTreeError::Config("schema declares no record fields".into()))?
            .to_string();

        let mut body = self.known_fields(fields);
        let mut full: Body = self
            .schema
            .fields
            .iter()
            .map(|f| (f.clone(), body.shift_remove(f).unwrap_or_default()))
            .collect();

        let uid_blank = full.get(SURROGATE_KEY_FIELD).map_or(true, FieldValue::is_blank);
        if key_field == SURROGATE_KEY_FIELD && uid_blank {
            let uid = identity::next_id(self.store.iter_insertion().map(|r| r.key.as_str()))?;
            full.insert(SURROGATE_KEY_FIELD.to_string(), FieldValue::Text(uid));
        }
        let key = full
            .get(&key_field)
            .map(|v| v.encode().into_owned())
            .unwrap_or_default();

        let record = self.store.insert(key, full, id)?;
        log::debug!("created record {} ('{}')", record.id, record.key);
        Ok(record)
    }

    /// Keep the fields the schema knows, warning about the rest.
    fn known_fields<I, K, V>(&self, fields: I) -> Body
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let mut body = Body::new();
        for (name, value) in fields {
            let name = name.as_ref();
            if self.schema.has_field(name) {
                body.insert(name.to_string(), value.into());
            } else {
                log::warn!("ignoring unknown field '{name}'");
            }
        }
        body
    }

    /// Overwrite the given fields of the record with `id`.
    pub fn update<I, K, V>(&mut self, id: &str, fields: I) -> Result<&Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<FieldValue>,
    {
        let body = self.known_fields(fields);
        let key_field = self.schema.default_key().map(str::to_string);
        self.store.update(id, body, key_field.as_deref())
    }

    pub fn delete(&mut self, id: &str) -> Result<Record> {
        let record = self.store.remove(id)?;
        log::debug!("deleted record {id} ('{}')", record.key);
        Ok(record)
    }

    /// Delete every tree node matching `path`, then reload. Returns the number
    /// of nodes removed.
    pub fn delete_matching(&mut self, path: &str) -> Result<usize> {
        self.ensure_fresh();
        let mut tree = self.tree.borrow().clone();
        let removed = tree.delete(path)?;
        if removed > 0 {
            self.reload(tree)?;
        }
        Ok(removed)
    }

    /// Append a raw record element, e.g.
    /// `<contact><name>Bob</name></contact>`, then reload.
    pub fn add_element(&mut self, markup: &str) -> Result<()> {
        let element = tree::parse(markup)?;
        self.ensure_fresh();
        let mut tree = self.tree.borrow().clone();
        match tree.child_mut(RECORDS_ELEMENT) {
            Some(records) => records.push(element),
            None => {
                let mut records = Element::new(RECORDS_ELEMENT);
                records.push(element);
                tree.push(records);
            }
        }
        self.reload(tree)
    }

    /// Decode `text` and reconcile the store against it: matching keys are
    /// updated, new keys inserted, and records missing from the text removed.
    ///
    /// A header pragma in `text` changes the configuration. Nothing changes
    /// unless the whole text decodes.
    pub fn import(&mut self, text: &str) -> Result<MergeReport> {
        let (pragma, lines) = decode::split_pragma(text)?;
        let mut settings = self.settings();
        if let Some(pragma) = &pragma {
            for (name, value) in &pragma.attributes {
                settings.apply(name, value)?;
            }
        }

        let mask_text = sync::effective_mask(&settings.schema, &settings.options);
        let mask = if mask_text.is_empty() {
            None
        } else {
            Some(FormatMask::parse(&mask_text)?)
        };
        let batch = decode::decode_lines(
            &lines,
            &settings.schema,
            DecodeSettings {
                mask: mask.as_ref(),
                unique: settings.options.unique,
                linked: settings.options.linked,
            },
        )?;
        if batch.promoted {
            settings.schema.promote_surrogate_key();
        }

        // Reconcile on the side so a failure leaves the document as it was
        let mut store = if settings.schema.raw == self.schema.raw {
            std::mem::take(&mut self.store)
        } else {
            RecordStore::new(settings.options.order)
        };
        store.set_order(settings.options.order);
        let report = match store.reconcile(batch.rows) {
            Ok(report) => report,
            Err(e) => {
                if settings.schema.raw == self.schema.raw {
                    store.set_order(self.options.order);
                    self.store = store;
                }
                return Err(e);
            }
        };

        self.install(settings);
        self.store = store;
        self.store.mark_dirty();
        for (key, value) in batch.summary {
            self.summary.set(&key, value);
        }
        log::info!(
            "imported {:?} text: {} inserted, {} updated, {} removed",
            batch.dialect,
            report.inserted,
            report.updated,
            report.removed
        );
        Ok(report)
    }

    /// Alias of [`Document::import`].
    pub fn parse(&mut self, text: &str) -> Result<MergeReport> {
        self.import(text)
    }

    /// Import the text at a file path or URL.
    pub fn import_from(&mut self, location: &str) -> Result<MergeReport> {
        let text = source::read_location(location)?;
        self.import(&text)
    }

    /// Reorder records by `field`.
    pub fn sort_by(&mut self, field: &str) -> Result<()> {
        if !self.schema.has_field(field) {
            return Err(RowTreeError::UnknownField(field.to_string()));
        }
        self.store.sort_by_field(field);
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Records in display order.
    pub fn records(&self) -> Vec<&Record> {
        self.ensure_fresh();
        self.store.iter().collect()
    }

    /// Field maps only, in display order.
    pub fn flat_records(&self) -> Vec<Body> {
        self.ensure_fresh();
        self.store.flat()
    }

    pub fn record(&self, id: &str) -> Result<&Record> {
        self.ensure_fresh();
        self.store
            .get_by_id(id)
            .ok_or_else(|| RowTreeError::RecordNotFound { id: id.to_string() })
    }

    pub fn record_exists(&self, id: &str) -> bool {
        self.store.get_by_id(id).is_some()
    }

    /// Record by its key value.
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.ensure_fresh();
        self.store.get(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn fields(&self) -> &[String] {
        &self.schema.fields
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// File the document was opened from or last saved to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// First record whose `field` equals `value`.
    pub fn query(&self, field: &str, value: &str) -> Result<Option<&Record>> {
        self.ensure_fresh();
        FieldQuery::new(&self.schema, &self.store, &self.index).first(field, value)
    }

    pub fn query_all(&self, field: &str, value: &str) -> Result<Vec<&Record>> {
        self.ensure_fresh();
        FieldQuery::new(&self.schema, &self.store, &self.index).all(field, value)
    }

    /// Records whose `field` matches the regular expression `pattern`.
    pub fn query_matching(&self, field: &str, pattern: &str) -> Result<Vec<&Record>> {
        self.ensure_fresh();
        FieldQuery::new(&self.schema, &self.store, &self.index).matching(field, pattern)
    }

    /// Tree nodes matching `path`, relative to the root element, e.g.
    /// `records/contact[name='Bob']`.
    pub fn select(&self, path: &str) -> Result<Vec<Element>> {
        self.ensure_fresh();
        let tree = self.tree.borrow();
        let selected = tree.select(path)?.into_iter().cloned().collect();
        Ok(selected)
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// Render in the configured output format.
    pub fn render(&self) -> Result<String> {
        match self.options.output {
            OutputFormat::Xml => Ok(self.to_xml()),
            OutputFormat::Delimited => self.to_delimited(),
            OutputFormat::Block => Ok(self.to_block()),
            OutputFormat::Section => Ok(self.to_section()),
            OutputFormat::Yaml => self.to_yaml(),
            OutputFormat::Table => Ok(self.to_table()),
        }
    }

    fn xml_options(&self) -> XmlOptions {
        XmlOptions {
            pretty: self.options.pretty,
            declaration: true,
            stylesheet: self.options.stylesheet.clone(),
        }
    }

    pub fn to_xml(&self) -> String {
        self.to_xml_with(&self.xml_options())
    }

    pub fn to_xml_with(&self, options: &XmlOptions) -> String {
        self.ensure_fresh();
        match self.store.order() {
            Order::Ascending => self.tree.borrow().to_xml(options),
            Order::Descending => {
                sync::rebuild(&self.schema, &self.summary, &self.store, Layout::External)
                    .to_xml(options)
            }
        }
    }

    pub fn to_delimited(&self) -> Result<String> {
        self.ensure_fresh();
        let mask = FormatMask::parse(&sync::effective_mask(&self.schema, &self.options))?;
        Ok(render::delimited(&self.store, &mask))
    }

    pub fn to_block(&self) -> String {
        self.ensure_fresh();
        render::block(&self.schema, &self.store)
    }

    pub fn to_section(&self) -> String {
        self.ensure_fresh();
        render::section(&self.schema, &self.store)
    }

    pub fn to_yaml(&self) -> Result<String> {
        self.ensure_fresh();
        render::yaml(&self.schema, &self.store)
    }

    pub fn to_table(&self) -> String {
        self.ensure_fresh();
        render::table(&self.schema, &self.store, self.options.table_header)
    }

    /// RSS 2.0 feed of the newest `limit` records.
    pub fn to_rss(&self, limit: usize) -> String {
        self.ensure_fresh();
        render::rss(&self.schema, &self.summary, &self.store, limit)
    }

    /// XSLT stylesheet that presents this document's markup as an HTML table.
    pub fn to_xslt(&self) -> String {
        render::xslt(&self.schema)
    }

    /// Records in display order as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        self.ensure_fresh();
        let records: Vec<&Record> = self.store.iter().collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Write the markup back to the file the document came from.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| RowTreeError::Config("document has no file path; use save_as".into()))?;
        self.save_as(&path)
    }

    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        let xml = self.to_xml_with(&XmlOptions {
            pretty: true,
            ..self.xml_options()
        });
        std::fs::write(path, xml)?;
        log::info!("saved {} records to {}", self.store.len(), path.display());
        self.path = Some(path.to_path_buf());
        Ok(())
    }
}
