//! Verbal autopsy data explorer.
//!
//! Loads record files (CSV, Excel, JSON), decodes them with an optional
//! codebook, and answers search/filter/sort/page queries over the result.
//! [`Session`] ties the pieces together.

pub mod codebook;
pub mod column_index;
pub mod config;
pub mod error;
pub mod export;
pub mod parser;
pub mod payload;
pub mod query;
pub mod record;
pub mod report;
pub mod selection;
pub mod session;
pub mod statistics;
pub mod value;

pub use codebook::{apply_codebook, parse_codebook, Codebook, CodebookEntry, DecodedRecordSet};
pub use config::{AppConfig, ConfigManager};
pub use error::{ApplyError, ParseError};
pub use parser::{parse, read_path, ParseOptions};
pub use query::{ColumnFilter, FilterOperator, Query, QueryView, SortDirection, SortKey};
pub use record::{Record, RecordId, RecordSet};
pub use selection::Selection;
pub use session::{Session, SessionConfig};
pub use value::Value;

/// Re-export CLI definitions shared with the build script
pub use vade_cli::{Args, CompressionFormat, FileFormat};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "vade";
