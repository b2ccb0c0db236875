//! # bklog - Build Log Parsing and Querying
//!
//! Turns timestamped CI build logs into a compact columnar record store and
//! answers streaming queries over it.
//!
//! ## Features
//!
//! - **Total Tokenizer**: every physical line parses; malformed timestamp envelopes degrade to untimed content
//! - **Group Tracking**: `~~~ `, `--- ` and `+++ ` headers name the section of every following line
//! - **Fast Escape Stripping**: zero-copy when a line has no escape sequences
//! - **Compression Support**: gzip, bzip2, xz and zstd raw logs are read transparently
//! - **Streaming Queries**: scan, seek, tail, group filter, group statistics and regex search with context
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - Ingestion and storage tunables
//! - [`parser`] - Tokenizer, group tracking and escape stripping
//! - [`record`] - Persisted record types
//! - [`store`] - Record store trait with columnar file and in-memory backends
//! - [`ingest`] - Raw log to record store pipelines
//! - [`query`] - Streaming read engine and group aggregation
//! - [`search`] - Forward and reverse regex search with context
//!
//! ```no_run
//! # async fn run() -> bklog::Result<()> {
//! use bklog::{Config, LogReader, SearchOptions};
//!
//! let config = Config::default();
//! bklog::ingest::ingest_to_columnar("job.log.gz", "job.bklc", &config).await?;
//!
//! let reader = LogReader::open("job.bklc", &config.store)?;
//! for result in reader.search(&SearchOptions::new("error").context(2))? {
//!     let result = result?;
//!     println!("{}: {}", result.row(), result.matched.record.clean_content(true));
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod record;

// Line decoding
pub mod parser;

// Storage and ingestion
pub mod ingest;
pub mod store;

// Queries
pub mod query;
pub mod search;

// Re-export commonly used types for convenience
pub use config::{Config, IngestConfig, StoreConfig};
pub use error::{BklogError, Result};
pub use parser::{strip_ansi, tokenize, GroupTracker, ParsedEntry};
pub use query::{GroupInfo, LogReader};
pub use record::{RecordFlags, RowRecord, StoredRecord};
pub use search::{SearchOptions, SearchResult};
pub use store::{ColumnarStore, ColumnarWriter, MemoryStore, RecordStore, RecordWriter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
