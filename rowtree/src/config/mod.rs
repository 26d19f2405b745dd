use crate::error::{Result, RowTreeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Record ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// New records go last; the first decoded row gets the lowest id
    #[default]
    Ascending,
    /// New records go first; the first decoded row gets the highest id
    Descending,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Ascending => "ascending",
            Order::Descending => "descending",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Order {
    type Err = RowTreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ascending" | "asc" => Ok(Order::Ascending),
            "descending" | "desc" => Ok(Order::Descending),
            other => Err(RowTreeError::Config(format!(
                "order must be 'ascending' or 'descending', got '{other}'"
            ))),
        }
    }
}

/// What `Document::render` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Xml,
    Delimited,
    Block,
    Section,
    Yaml,
    Table,
}

impl FromStr for OutputFormat {
    type Err = RowTreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "xml" => Ok(OutputFormat::Xml),
            "delimited" | "text" => Ok(OutputFormat::Delimited),
            "block" => Ok(OutputFormat::Block),
            "section" => Ok(OutputFormat::Section),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            other => Err(RowTreeError::Config(format!("unknown output format '{other}'"))),
        }
    }
}

/// Document configuration. Loaded from YAML, then overridden by values the
/// document itself carries in its summary, then by header pragmas and setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default)]
    pub format_mask: Option<String>,
    #[serde(default)]
    pub order: Order,
    /// Reject batches with repeated keys instead of promoting a surrogate key
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default_key: Option<String>,
    #[serde(default)]
    pub output: OutputFormat,
    /// Line dialect values are locations to fetch
    #[serde(default)]
    pub linked: bool,
    #[serde(default)]
    pub stylesheet: Option<String>,
    #[serde(default)]
    pub pretty: bool,
    #[serde(default = "default_true")]
    pub table_header: bool,
}

fn default_delimiter() -> String {
    " ".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions {
            delimiter: default_delimiter(),
            format_mask: None,
            order: Order::default(),
            unique: false,
            default_key: None,
            output: OutputFormat::default(),
            linked: false,
            stylesheet: None,
            pretty: false,
            table_header: true,
        }
    }
}

impl DocumentOptions {
    /// Parse options from a YAML string.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let options: DocumentOptions = serde_yaml::from_str(content)?;
        Ok(options)
    }

    /// Parse options from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

/// Parse a boolean configuration value as written in summaries and pragmas.
pub fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" | "" => Ok(false),
        other => Err(RowTreeError::Config(format!(
            "{name} must be true or false, got '{other}'"
        ))),
    }
}
