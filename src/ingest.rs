//! Ingestion of raw build logs into a record store.
//!
//! - [`compression`] detects and decodes compressed inputs
//! - [`batcher`] tokenizes lines, tracks groups and groups records into batches
//! - [`pipeline`] drives a source into a [`RecordWriter`](crate::store::RecordWriter)

pub mod batcher;
pub mod compression;
pub mod pipeline;

pub use batcher::{IngestSummary, LineBatcher, RecordFilter};
pub use compression::{detect_compression, open_log_source, CompressionType, LogSource};
pub use pipeline::{
    ingest_file, ingest_file_filtered, ingest_many, ingest_reader, ingest_to_columnar, IngestJob,
};
