pub mod config;
pub mod decode;
pub mod document;
pub mod error;
pub mod identity;
pub mod query;
pub mod record;
pub mod render;
pub mod schema;
pub mod source;
pub mod store;
pub mod sync;
pub mod template;
pub mod tree;

pub use config::{DocumentOptions, Order, OutputFormat};
pub use decode::Dialect;
pub use document::Document;
pub use error::{Result, RowTreeError};
pub use record::{Body, FieldValue, Record};
pub use schema::Schema;
pub use store::MergeReport;
pub use sync::Summary;
pub use tree::{Element, XmlOptions};
