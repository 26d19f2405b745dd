use crate::config::{parse_flag, DocumentOptions};
use crate::error::{Result, RowTreeError};
use crate::schema::{parse_schema_str, Schema};
use crate::sync::{
    effective_mask, DEFAULT_KEY_KEY, DELIMITER_KEY, FORMAT_MASK_KEY, ORDER_KEY, SCHEMA_KEY,
    UNIQUE_KEY,
};
use crate::template::{with_delimiter, FormatMask};

pub const STYLESHEET_KEY: &str = "stylesheet";

/// Schema and options, changed together so a failed change leaves the
/// document untouched.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub schema: Schema,
    pub options: DocumentOptions,
}

impl Settings {
    /// Apply one named setting, as written in a header pragma or summary.
    pub fn apply(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            SCHEMA_KEY => {
                if value.trim() != self.schema.raw {
                    self.schema = parse_schema_str(value)?;
                    self.options.format_mask = None;
                    self.options.default_key = None;
                }
            }
            DELIMITER_KEY => self.set_delimiter(value),
            FORMAT_MASK_KEY => {
                FormatMask::parse(value)?;
                self.options.format_mask = Some(value.to_string());
            }
            ORDER_KEY => self.options.order = value.parse()?,
            UNIQUE_KEY => self.options.unique = parse_flag(UNIQUE_KEY, value)?,
            DEFAULT_KEY_KEY => self.set_default_key(value.trim())?,
            STYLESHEET_KEY => {
                self.options.stylesheet = Some(value.trim().to_string()).filter(|s| !s.is_empty());
            }
            other => {
                return Err(RowTreeError::Config(format!("unknown setting '{other}'")));
            }
        }
        Ok(())
    }

    /// Change the delimiter, rewriting the separators of the current mask.
    pub fn set_delimiter(&mut self, delimiter: &str) {
        let mask = effective_mask(&self.schema, &self.options);
        self.options.format_mask = Some(with_delimiter(&mask, delimiter)).filter(|m| !m.is_empty());
        self.options.delimiter = delimiter.to_string();
    }

    pub fn set_default_key(&mut self, field: &str) -> Result<()> {
        if !self.schema.has_field(field) {
            return Err(RowTreeError::UnknownField(field.to_string()));
        }
        self.schema.default_key = Some(field.to_string());
        self.options.default_key = Some(field.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Order;
    use pretty_assertions::assert_eq;

    fn settings() -> Settings {
        Settings {
            schema: parse_schema_str("contacts/contact(name,telno)").unwrap(),
            options: DocumentOptions::default(),
        }
    }

    #[test]
    fn test_apply_known_settings() {
        let mut s = settings();
        s.apply("order", "descending").unwrap();
        s.apply("unique", "true").unwrap();
        s.apply("delimiter", ",").unwrap();
        s.apply("default_key", "telno").unwrap();
        assert_eq!(s.options.order, Order::Descending);
        assert!(s.options.unique);
        assert_eq!(s.options.format_mask.as_deref(), Some("[!name],[!telno]"));
        assert_eq!(s.schema.default_key(), Some("telno"));
    }

    #[test]
    fn test_schema_resets_mask_and_key() {
        let mut s = settings();
        s.apply("format_mask", "[!name]: [!telno]").unwrap();
        s.apply("schema", "notes/note(title,body)").unwrap();
        assert_eq!(s.schema.fields, vec!["title", "body"]);
        assert!(s.options.format_mask.is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut s = settings();
        assert!(matches!(s.apply("colour", "red"), Err(RowTreeError::Config(_))));
        assert!(matches!(s.apply("order", "up"), Err(RowTreeError::Config(_))));
        assert!(matches!(s.apply("default_key", "age"), Err(RowTreeError::UnknownField(_))));
        assert!(s.apply("format_mask", "no fields").is_err());
    }
}
