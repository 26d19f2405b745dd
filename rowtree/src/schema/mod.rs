mod parser;
mod types;

pub use parser::{is_valid_name, parse_schema_str, parse_schema_with_key};
pub use types::*;
