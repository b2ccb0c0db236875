//! Streaming queries over a record store.
//!
//! Every query opens its own stream from the store and owns it until the
//! returned iterator is dropped, so queries never share state and may run on
//! different threads over the same file.

pub mod groups;

pub use groups::{GroupAggregator, GroupInfo};

use crate::config::StoreConfig;
use crate::error::{BklogError, Result};
use crate::search::{self, SearchIter, SearchOptions};
use crate::store::{ColumnarStore, FileInfo, RecordStore, RecordStream};
use std::path::Path;

/// Query entry point over any [`RecordStore`]
#[derive(Debug, Clone)]
pub struct LogReader<S> {
    store: S,
}

impl LogReader<ColumnarStore> {
    /// Open a columnar record file
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(ColumnarStore::open(path, config)?))
    }
}

impl<S: RecordStore> LogReader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every record from row 0
    pub fn entries(&self) -> Result<RecordStream> {
        self.store.read_from(0)
    }

    /// Records from `row` onwards; `row` must be an existing row
    pub fn seek(&self, row: u64) -> Result<RecordStream> {
        let total_rows = self.store.row_count()?;
        if row >= total_rows {
            return Err(BklogError::RowOutOfRange { row, total_rows });
        }
        self.store.read_from(row)
    }

    /// The last `n` records
    pub fn tail(&self, n: u64) -> Result<RecordStream> {
        let total_rows = self.store.row_count()?;
        if n == 0 || total_rows == 0 {
            return Ok(Box::new(std::iter::empty()));
        }
        let start = total_rows.saturating_sub(n);
        Ok(Box::new(self.store.read_from(start)?.take(n as usize)))
    }

    /// Records whose group contains `pattern`, ignoring case
    ///
    /// Records outside any group match against `<no group>`.
    pub fn filter_by_group(&self, pattern: &str) -> Result<RecordStream> {
        let needle = pattern.to_lowercase();
        let stream = self.store.read_from(0)?;
        Ok(Box::new(stream.filter(move |row| match row {
            Ok(row) => row
                .record
                .display_group()
                .to_lowercase()
                .contains(&needle),
            Err(_) => true,
        })))
    }

    pub fn info(&self) -> Result<FileInfo> {
        self.store.info()
    }

    /// Statistics for every group, ordered by first appearance
    pub fn groups(&self) -> Result<Vec<GroupInfo>> {
        let mut aggregator = GroupAggregator::new();
        for row in self.entries()? {
            aggregator.add(&row?.record);
        }
        log::debug!(
            "Aggregated {} records into groups",
            aggregator.records()
        );
        Ok(aggregator.finish())
    }

    /// Regex search with context, forward or reverse
    pub fn search(&self, options: &SearchOptions) -> Result<SearchIter> {
        search::search(&self.store, options)
    }
}
