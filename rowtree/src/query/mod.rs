// Lookups by field value over the schema's fixed field list

use crate::error::{Result, RowTreeError};
use crate::record::Record;
use crate::schema::Schema;
use crate::store::RecordStore;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;

/// Exact-value lookup tables, one per queried field, built on first use.
///
/// Each table maps a field's text to record keys in display order. The
/// owner clears the index whenever the store changes.
#[derive(Debug, Default)]
pub struct FieldIndex {
    fields: HashMap<String, HashMap<String, Vec<String>>>,
}

impl FieldIndex {
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn is_built(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Keys whose `field` equals `value`, building the field's table if needed.
    fn keys(&mut self, store: &RecordStore, field: &str, value: &str) -> Vec<String> {
        let table = self.fields.entry(field.to_string()).or_insert_with(|| {
            log::debug!("indexing field '{field}' over {} records", store.len());
            let mut table: HashMap<String, Vec<String>> = HashMap::new();
            for record in store.iter() {
                table
                    .entry(record.text(field).into_owned())
                    .or_default()
                    .push(record.key.clone());
            }
            table
        });
        table.get(value).cloned().unwrap_or_default()
    }
}

/// Field lookups against a store, in display order.
pub struct FieldQuery<'a> {
    schema: &'a Schema,
    store: &'a RecordStore,
    index: &'a RefCell<FieldIndex>,
}

impl<'a> FieldQuery<'a> {
    pub fn new(schema: &'a Schema, store: &'a RecordStore, index: &'a RefCell<FieldIndex>) -> Self {
        FieldQuery { schema, store, index }
    }

    fn lookup(&self, field: &str, value: &str) -> Vec<&'a Record> {
        let store = self.store;
        self.index
            .borrow_mut()
            .keys(store, field, value)
            .iter()
            .filter_map(|key| store.get(key))
            .collect()
    }

    fn check_field(&self, field: &str) -> Result<()> {
        if self.schema.has_field(field) {
            Ok(())
        } else {
            Err(RowTreeError::UnknownField(field.to_string()))
        }
    }

    /// First record whose `field` equals `value`.
    pub fn first(&self, field: &str, value: &str) -> Result<Option<&'a Record>> {
        self.check_field(field)?;
        Ok(self.lookup(field, value).into_iter().next())
    }

    /// Every record whose `field` equals `value`.
    pub fn all(&self, field: &str, value: &str) -> Result<Vec<&'a Record>> {
        self.check_field(field)?;
        Ok(self.lookup(field, value))
    }

    /// Every record whose `field` matches the regular expression `pattern`.
    pub fn matching(&self, field: &str, pattern: &str) -> Result<Vec<&'a Record>> {
        self.check_field(field)?;
        let re = Regex::new(pattern)?;
        Ok(self
            .store
            .iter()
            .filter(|r| re.is_match(&r.text(field)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Order;
    use crate::schema::parse_schema_str;
    use crate::store::body_from_pairs;

    fn people() -> (Schema, RecordStore) {
        let schema = parse_schema_str("people/person(name,city)").unwrap();
        let mut store = RecordStore::new(Order::Ascending);
        for (name, city) in [("Bob", "Leeds"), ("Ann", "York"), ("Cat", "Leeds")] {
            let body = body_from_pairs(&schema.fields, [("name", name), ("city", city)]);
            store.insert(name.to_string(), body, None).unwrap();
        }
        (schema, store)
    }

    #[test]
    fn test_first_and_all() {
        let (schema, store) = people();
        let index = RefCell::default();
        let query = FieldQuery::new(&schema, &store, &index);
        assert_eq!(query.first("city", "Leeds").unwrap().map(|r| r.key.as_str()), Some("Bob"));
        assert!(query.first("city", "Hull").unwrap().is_none());
        let keys: Vec<&str> = query.all("city", "Leeds").unwrap().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Bob", "Cat"]);
    }

    #[test]
    fn test_index_is_built_per_field() {
        let (schema, mut store) = people();
        let index = RefCell::new(FieldIndex::default());
        {
            let query = FieldQuery::new(&schema, &store, &index);
            assert_eq!(query.all("city", "York").unwrap().len(), 1);
            assert_eq!(query.matching("name", "^A").unwrap().len(), 1);
        }
        assert!(index.borrow().is_built("city"));
        assert!(!index.borrow().is_built("name"));

        let body = body_from_pairs(&schema.fields, [("name", "Dan"), ("city", "York")]);
        store.insert("Dan".to_string(), body, None).unwrap();
        index.borrow_mut().clear();
        let query = FieldQuery::new(&schema, &store, &index);
        let keys: Vec<&str> = query.all("city", "York").unwrap().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Ann", "Dan"]);
    }

    #[test]
    fn test_matching() {
        let (schema, store) = people();
        let index = RefCell::default();
        let query = FieldQuery::new(&schema, &store, &index);
        assert_eq!(query.matching("name", "^[AB]").unwrap().len(), 2);
        assert!(matches!(query.matching("name", "("), Err(RowTreeError::Regex(_))));
    }

    #[test]
    fn test_unknown_field() {
        let (schema, store) = people();
        let index = RefCell::default();
        let query = FieldQuery::new(&schema, &store, &index);
        assert!(matches!(query.all("age", "3"), Err(RowTreeError::UnknownField(f)) if f == "age"));
    }
}
