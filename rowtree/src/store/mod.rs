use crate::config::Order;
use crate::error::{Result, RowTreeError};
use crate::identity;
use crate::record::{timestamp, Body, FieldValue, Record};
use indexmap::IndexMap;
use serde::Serialize;
use std::cell::Cell;

/// Counts reported by a reconciliation merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

/// The ordered key → record mapping.
///
/// Records are held in insertion order (oldest first). Under descending order
/// the display order is the reverse, so a record appended here shows up first.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: IndexMap<String, Record>,
    order: Order,
    /// Set by every mutation, cleared once the tree is rebuilt
    dirty: Cell<bool>,
}

impl RecordStore {
    pub fn new(order: Order) -> Self {
        RecordStore {
            records: IndexMap::new(),
            order,
            dirty: Cell::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Switching order flips the display order; ids are left alone.
    pub fn set_order(&mut self, order: Order) {
        if self.order != order {
            self.order = order;
            self.dirty.set(true);
        }
    }

    /// True when the mapping is newer than the tree built from it.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn mark_clean(&self) {
        self.dirty.set(false);
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Record> {
        self.records.values().find(|r| r.id == id)
    }

    /// Records in insertion order.
    pub fn iter_insertion(&self) -> impl DoubleEndedIterator<Item = &Record> {
        self.records.values()
    }

    /// Records in display order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self.order {
            Order::Ascending => Box::new(self.records.values()),
            Order::Descending => Box::new(self.records.values().rev()),
        }
    }

    /// Body maps only, in display order.
    pub fn flat(&self) -> Vec<Body> {
        self.iter().map(|r| r.body.clone()).collect()
    }

    pub fn next_id(&self) -> Result<String> {
        identity::next_id(self.records.values().map(|r| r.id.as_str()))
    }

    /// Append a record exactly as loaded; the store stays clean.
    pub fn push_loaded(&mut self, record: Record) {
        self.records.insert(record.key.clone(), record);
    }

    /// Insert a new record. The id is allocated unless given.
    pub fn insert(&mut self, key: String, body: Body, id: Option<String>) -> Result<&Record> {
        if self.records.contains_key(&key) {
            return Err(RowTreeError::DuplicateKey { key });
        }
        let id = match id {
            Some(id) => id,
            None => self.next_id()?,
        };
        if self.get_by_id(&id).is_some() {
            return Err(RowTreeError::DuplicateKey { key: id });
        }

        let record = Record {
            key: key.clone(),
            id,
            created: timestamp(),
            last_modified: String::new(),
            attributes: Vec::new(),
            body,
        };
        log::debug!("inserting record '{}' with id {}", key, record.id);
        let (index, _) = self.records.insert_full(key, record);
        self.dirty.set(true);
        Ok(&self.records[index])
    }

    /// Overwrite the given fields of the record with `id`. Fields not in
    /// `fields` keep their values; a changed key field re-keys the record in
    /// place.
    pub fn update(&mut self, id: &str, fields: Body, key_field: Option<&str>) -> Result<&Record> {
        let index = self
            .records
            .values()
            .position(|r| r.id == id)
            .ok_or_else(|| RowTreeError::RecordNotFound { id: id.to_string() })?;

        let new_key = key_field
            .and_then(|k| fields.get(k))
            .map(|v| v.encode().into_owned());
        if let Some(new_key) = &new_key {
            let current = self.records.get_index(index).map(|(k, _)| k.as_str());
            if current != Some(new_key.as_str()) && self.records.contains_key(new_key) {
                return Err(RowTreeError::DuplicateKey {
                    key: new_key.clone(),
                });
            }
        }

        let (_, mut record) = self
            .records
            .shift_remove_index(index)
            .ok_or_else(|| RowTreeError::RecordNotFound { id: id.to_string() })?;
        for (field, value) in fields {
            record.body.insert(field, value);
        }
        if let Some(new_key) = new_key {
            record.key = new_key;
        }
        record.last_modified = timestamp();
        self.records.shift_insert(index, record.key.clone(), record);
        self.dirty.set(true);
        Ok(&self.records[index])
    }

    /// Remove the record with `id`.
    pub fn remove(&mut self, id: &str) -> Result<Record> {
        let index = self
            .records
            .values()
            .position(|r| r.id == id)
            .ok_or_else(|| RowTreeError::RecordNotFound { id: id.to_string() })?;
        let (_, record) = self
            .records
            .shift_remove_index(index)
            .ok_or_else(|| RowTreeError::RecordNotFound { id: id.to_string() })?;
        self.dirty.set(true);
        Ok(record)
    }

    /// Reconcile the store against a fully decoded batch.
    ///
    /// Keys present in both are updated field by field, new keys are
    /// inserted with fresh ids, and every record whose key is missing from
    /// the batch is removed. Repeated keys in the batch collapse onto the
    /// first position with the last values. Fails without touching the
    /// store when the new rows cannot be numbered.
    pub fn reconcile(&mut self, batch: Vec<(String, Body)>) -> Result<MergeReport> {
        let mut incoming: IndexMap<String, Body> = IndexMap::new();
        for (key, body) in batch {
            match incoming.get_mut(&key) {
                Some(existing) => existing.extend(body),
                None => {
                    incoming.insert(key, body);
                }
            }
        }

        // Ids for new rows start above whatever survives
        let base = identity::max_id(
            self.records
                .values()
                .filter(|r| incoming.contains_key(&r.key))
                .map(|r| r.id.as_str()),
        );
        let new_count = incoming
            .keys()
            .filter(|k| !self.records.contains_key(*k))
            .count();
        let mut ids = identity::batch_ids(base, new_count, self.order)?.into_iter();

        let mut report = MergeReport::default();
        let before = self.records.len();
        self.records.retain(|key, _| incoming.contains_key(key));
        report.removed = before - self.records.len();

        let now = timestamp();
        let mut fresh = Vec::with_capacity(new_count);
        for (key, body) in incoming {
            if let Some(record) = self.records.get_mut(&key) {
                for (field, value) in body {
                    record.body.insert(field, value);
                }
                record.last_modified = now.clone();
                report.updated += 1;
            } else {
                fresh.push(Record {
                    key,
                    id: ids.next().unwrap_or_default(),
                    created: now.clone(),
                    last_modified: String::new(),
                    attributes: Vec::new(),
                    body,
                });
            }
        }

        report.inserted = fresh.len();
        // Descending stores new rows reversed so display order matches the batch
        if self.order == Order::Descending {
            fresh.reverse();
        }
        for record in fresh {
            self.records.insert(record.key.clone(), record);
        }

        log::debug!(
            "reconciled batch: {} inserted, {} updated, {} removed",
            report.inserted,
            report.updated,
            report.removed
        );
        self.dirty.set(true);
        Ok(report)
    }

    /// Reorder records by the text of `field`, ascending in display order.
    pub fn sort_by_field(&mut self, field: &str) {
        self.records
            .sort_by(|_, a, _, b| a.text(field).cmp(&b.text(field)));
        if self.order == Order::Descending {
            self.records.reverse();
        }
        self.dirty.set(true);
    }

    /// Re-key every record by `key_field`, keeping order and ids.
    pub fn rekey(&mut self, key_field: &str) -> Result<()> {
        let keys: Vec<String> = self
            .records
            .values()
            .map(|r| r.text(key_field).into_owned())
            .collect();
        let mut seen = std::collections::HashSet::new();
        if let Some(key) = keys.iter().find(|k| !seen.insert(k.as_str())) {
            return Err(RowTreeError::DuplicateKey { key: key.clone() });
        }

        let records = std::mem::take(&mut self.records);
        self.records = records
            .into_values()
            .zip(keys)
            .map(|(mut record, key)| {
                record.key = key.clone();
                (key, record)
            })
            .collect();
        self.dirty.set(true);
        Ok(())
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            self.records.clear();
            self.dirty.set(true);
        }
    }
}

/// Build a body in `fields` order from `(name, value)` pairs; missing fields
/// are empty, names outside `fields` are dropped.
pub fn body_from_pairs<I, K, V>(fields: &[String], pairs: I) -> Body
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<FieldValue>,
{
    let mut given: IndexMap<String, FieldValue> = pairs
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.into()))
        .collect();
    fields
        .iter()
        .map(|f| (f.clone(), given.shift_remove(f).unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields() -> Vec<String> {
        vec!["name".into(), "telno".into()]
    }

    fn row(name: &str, telno: &str) -> (String, Body) {
        (
            name.to_string(),
            body_from_pairs(&fields(), [("name", name), ("telno", telno)]),
        )
    }

    fn keys(store: &RecordStore) -> Vec<String> {
        store.iter().map(|r| r.key.clone()).collect()
    }

    fn ids(store: &RecordStore) -> Vec<String> {
        store.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_insert_allocates_ids() {
        let mut store = RecordStore::new(Order::Ascending);
        let (key, body) = row("Bob", "555");
        let record = store.insert(key, body, None).unwrap();
        assert_eq!(record.id, "1");
        assert!(!record.created.is_empty());
        assert!(record.last_modified.is_empty());

        let (key, body) = row("Ann", "556");
        assert_eq!(store.insert(key, body, None).unwrap().id, "2");
        assert!(store.is_dirty());
        assert_eq!(keys(&store), vec!["Bob", "Ann"]);
    }

    #[test]
    fn test_insert_duplicate_key() {
        let mut store = RecordStore::new(Order::Ascending);
        let (key, body) = row("Bob", "555");
        store.insert(key, body, None).unwrap();
        let (key, body) = row("Bob", "999");
        assert!(matches!(
            store.insert(key, body, None),
            Err(RowTreeError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_descending_insert_goes_first() {
        let mut store = RecordStore::new(Order::Descending);
        for name in ["a", "b", "c"] {
            let (key, body) = row(name, "");
            store.insert(key, body, None).unwrap();
        }
        assert_eq!(keys(&store), vec!["c", "b", "a"]);
        assert_eq!(ids(&store), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_update_partial_fields_and_rekey() {
        let mut store = RecordStore::new(Order::Ascending);
        for name in ["a", "b", "c"] {
            let (key, body) = row(name, "1");
            store.insert(key, body, None).unwrap();
        }

        let mut change = Body::new();
        change.insert("telno".into(), "42".into());
        let updated = store.update("2", change, Some("name")).unwrap();
        assert_eq!(updated.text("telno"), "42");
        assert_eq!(updated.text("name"), "b");
        assert!(!updated.last_modified.is_empty());

        let mut rename = Body::new();
        rename.insert("name".into(), "bee".into());
        store.update("2", rename, Some("name")).unwrap();
        assert_eq!(keys(&store), vec!["a", "bee", "c"]);

        let mut clash = Body::new();
        clash.insert("name".into(), "a".into());
        assert!(matches!(
            store.update("2", clash, Some("name")),
            Err(RowTreeError::DuplicateKey { .. })
        ));
        assert!(matches!(
            store.update("9", Body::new(), Some("name")),
            Err(RowTreeError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_remove() {
        let mut store = RecordStore::new(Order::Ascending);
        let (key, body) = row("Bob", "555");
        store.insert(key, body, None).unwrap();
        store.mark_clean();
        assert_eq!(store.remove("1").unwrap().key, "Bob");
        assert!(store.is_dirty());
        assert!(matches!(store.remove("1"), Err(RowTreeError::RecordNotFound { .. })));
    }

    #[test]
    fn test_reconcile_upsert_and_delete_by_absence() {
        let mut store = RecordStore::new(Order::Ascending);
        let report = store.reconcile(vec![row("a", "1"), row("b", "2"), row("c", "3")]).unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(ids(&store), vec!["1", "2", "3"]);
        let created_a = store.get("a").unwrap().created.clone();

        let report = store.reconcile(vec![row("a", "10"), row("c", "3"), row("d", "4")]).unwrap();
        assert_eq!(
            report,
            MergeReport {
                inserted: 1,
                updated: 2,
                removed: 1
            }
        );
        assert_eq!(keys(&store), vec!["a", "c", "d"]);
        assert_eq!(ids(&store), vec!["1", "3", "4"]);
        let a = store.get("a").unwrap();
        assert_eq!(a.text("telno"), "10");
        assert_eq!(a.created, created_a);
        assert!(!a.last_modified.is_empty());
    }

    #[test]
    fn test_reconcile_leaves_absent_fields() {
        let mut store = RecordStore::new(Order::Ascending);
        store.reconcile(vec![row("a", "1")]).unwrap();
        let mut partial = Body::new();
        partial.insert("name".into(), "a".into());
        store.reconcile(vec![("a".to_string(), partial)]).unwrap();
        assert_eq!(store.get("a").unwrap().text("telno"), "1");
    }

    #[test]
    fn test_reconcile_descending_numbering() {
        let mut store = RecordStore::new(Order::Descending);
        store.reconcile(vec![row("a", ""), row("b", ""), row("c", "")]).unwrap();
        assert_eq!(keys(&store), vec!["a", "b", "c"]);
        assert_eq!(ids(&store), vec!["3", "2", "1"]);
        let internal: Vec<_> = store.iter_insertion().map(|r| r.key.as_str()).collect();
        assert_eq!(internal, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_exhausted_ids_leave_store_untouched() {
        let mut store = RecordStore::new(Order::Ascending);
        let (key, body) = row("a", "1");
        store.insert(key, body, Some(u64::MAX.to_string())).unwrap();
        let (key, body) = row("b", "2");
        assert!(matches!(store.insert(key, body, None), Err(RowTreeError::Config(_))));

        let err = store.reconcile(vec![row("a", "1"), row("b", "2")]).unwrap_err();
        assert!(matches!(err, RowTreeError::Config(_)));
        assert_eq!(keys(&store), vec!["a"]);

        // Dropping the maximum frees the range again
        store.reconcile(vec![row("b", "2")]).unwrap();
        assert_eq!(ids(&store), vec!["1"]);
    }

    #[test]
    fn test_rekey() {
        let mut store = RecordStore::new(Order::Ascending);
        for (name, telno) in [("a", "1"), ("b", "2")] {
            let (key, body) = row(name, telno);
            store.insert(key, body, None).unwrap();
        }
        store.rekey("telno").unwrap();
        assert_eq!(store.get("2").map(|r| r.id.as_str()), Some("2"));
        assert!(!store.contains_key("a"));

        let (_, body) = row("c", "2");
        store.insert("x".into(), body, None).unwrap();
        assert!(matches!(store.rekey("telno"), Err(RowTreeError::DuplicateKey { .. })));
        assert!(store.contains_key("x"));
    }

    #[test]
    fn test_sort_by_field() {
        let mut store = RecordStore::new(Order::Ascending);
        store.reconcile(vec![row("b", "2"), row("c", "1"), row("a", "3")]).unwrap();
        store.sort_by_field("name");
        assert_eq!(keys(&store), vec!["a", "b", "c"]);
        store.sort_by_field("telno");
        assert_eq!(keys(&store), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_body_from_pairs() {
        let body = body_from_pairs(&fields(), [("telno", "1"), ("other", "x")]);
        let names: Vec<_> = body.keys().cloned().collect();
        assert_eq!(names, vec!["name", "telno"]);
        assert_eq!(body["name"], FieldValue::default());
    }
}
