//! Record store abstraction with columnar file and in-memory backends.
//!
//! The query engine only depends on [`RecordStore`]: a row count and a lazy,
//! ascending stream of records from any starting row. Each call opens an
//! independent handle chain that is owned by the returned stream and released
//! when the stream is dropped, wherever iteration stopped.

use crate::error::{BklogError, Result};
use crate::record::{RowRecord, StoredRecord};
use std::sync::Arc;

pub mod codec;
pub mod columnar;
pub mod memory;
pub mod validation;

pub use codec::{ColumnDef, ColumnType, Schema};
pub use columnar::{ColumnarFile, ColumnarStore, ColumnarWriter};
pub use memory::{MemoryStore, MemoryWriter};
pub use validation::validate_file_path;

/// Lazy ascending stream of records with their absolute row ordinals
pub type RecordStream = Box<dyn Iterator<Item = Result<RowRecord>> + Send>;

/// Read side of a record store
pub trait RecordStore: Send + Sync {
    /// Total number of rows
    fn row_count(&self) -> Result<u64>;

    /// Stream records starting at `start_row` (0-based)
    ///
    /// Starting at row 0 of an empty store yields an empty stream; any other
    /// start at or past the end is a [`BklogError::RowOutOfRange`].
    fn read_from(&self, start_row: u64) -> Result<RecordStream>;

    /// Metadata about the backing storage
    fn info(&self) -> Result<FileInfo>;
}

/// Append-only write side of a record store
pub trait RecordWriter: Send {
    /// Append one batch; empty batches are ignored
    fn write_batch(&mut self, records: &[StoredRecord]) -> Result<()>;

    /// Make everything written so far durable and visible to readers
    fn finish(&mut self) -> Result<WriteSummary>;
}

/// Metadata about a record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    pub row_count: u64,
    pub column_count: usize,
    /// Size in bytes of the backing file, 0 for memory stores
    pub file_size: u64,
    pub num_batches: usize,
}

/// What a writer produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteSummary {
    pub rows: u64,
    pub batches: usize,
    pub bytes: u64,
}

/// Shared start-row rule for every backend
pub(crate) fn check_start_row(start_row: u64, total_rows: u64) -> Result<()> {
    if start_row > 0 && start_row >= total_rows {
        return Err(BklogError::RowOutOfRange {
            row: start_row,
            total_rows,
        });
    }
    Ok(())
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn row_count(&self) -> Result<u64> {
        (**self).row_count()
    }

    fn read_from(&self, start_row: u64) -> Result<RecordStream> {
        (**self).read_from(start_row)
    }

    fn info(&self) -> Result<FileInfo> {
        (**self).info()
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn row_count(&self) -> Result<u64> {
        (**self).row_count()
    }

    fn read_from(&self, start_row: u64) -> Result<RecordStream> {
        (**self).read_from(start_row)
    }

    fn info(&self) -> Result<FileInfo> {
        (**self).info()
    }
}

impl<W: RecordWriter + ?Sized> RecordWriter for Box<W> {
    fn write_batch(&mut self, records: &[StoredRecord]) -> Result<()> {
        (**self).write_batch(records)
    }

    fn finish(&mut self) -> Result<WriteSummary> {
        (**self).finish()
    }
}
