use thiserror::Error;

#[derive(Error, Debug)]
pub enum RowTreeError {
    #[error("Schema syntax error: {0}")]
    SchemaSyntax(String),

    #[error("Reserved field name: '{0}'")]
    ReservedFieldName(String),

    #[error("Decode error at line {line}: {text}")]
    Decode { line: usize, text: String },

    #[error("Duplicate key: '{key}'")]
    DuplicateKey { key: String },

    #[error("Record not found: id {id}")]
    RecordNotFound { id: String },

    #[error("Unknown field: '{0}'")]
    UnknownField(String),

    #[error("Source unavailable: {location} ({reason})")]
    SourceUnavailable { location: String, reason: String },

    #[error("Markup error: {0}")]
    Markup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl RowTreeError {
    /// Shorthand for a decode failure at a 1-based line.
    pub fn decode(line: usize, text: impl Into<String>) -> Self {
        RowTreeError::Decode {
            line,
            text: text.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RowTreeError>;
