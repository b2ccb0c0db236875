//! In-memory record store.
//!
//! Batches are immutable once written and shared behind a `parking_lot`
//! read-write lock. Readers snapshot the batch list when a stream starts, so a
//! writer appending concurrently never disturbs a running query.

use crate::config::StoreConfig;
use crate::error::Result;
use crate::record::{RowRecord, StoredRecord};
use crate::store::{check_start_row, FileInfo, RecordStore, RecordStream, RecordWriter, WriteSummary};
use parking_lot::RwLock;
use std::sync::Arc;

type Batch = Arc<[StoredRecord]>;

/// Shared in-memory store; clones see the same batches
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    batches: Arc<RwLock<Vec<Batch>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `records` as a single batch
    pub fn from_records(records: Vec<StoredRecord>) -> Self {
        let store = Self::new();
        if !records.is_empty() {
            store.batches.write().push(records.into());
        }
        store
    }

    /// Writer appending to this store, splitting batches above `max_batch_rows`
    pub fn writer(&self, max_batch_rows: usize) -> MemoryWriter {
        MemoryWriter {
            batches: Arc::clone(&self.batches),
            max_batch_rows: max_batch_rows.max(1),
            rows: 0,
            written: 0,
        }
    }

    /// Writer using the configured `read_batch_rows` as its batch bound
    pub fn writer_with_config(&self, config: &StoreConfig) -> MemoryWriter {
        self.writer(config.read_batch_rows)
    }

    fn snapshot(&self) -> Vec<Batch> {
        self.batches.read().clone()
    }
}

fn total_rows(batches: &[Batch]) -> u64 {
    batches.iter().map(|batch| batch.len() as u64).sum()
}

impl RecordStore for MemoryStore {
    fn row_count(&self) -> Result<u64> {
        Ok(total_rows(&self.batches.read()))
    }

    fn read_from(&self, start_row: u64) -> Result<RecordStream> {
        let batches = self.snapshot();
        check_start_row(start_row, total_rows(&batches))?;

        let mut batch = 0;
        let mut offset = start_row;
        while batch < batches.len() && offset >= batches[batch].len() as u64 {
            offset -= batches[batch].len() as u64;
            batch += 1;
        }

        Ok(Box::new(MemoryStream {
            batches,
            batch,
            offset: offset as usize,
            next_row: start_row,
        }))
    }

    fn info(&self) -> Result<FileInfo> {
        let batches = self.batches.read();
        Ok(FileInfo {
            row_count: total_rows(&batches),
            column_count: 4,
            file_size: 0,
            num_batches: batches.len(),
        })
    }
}

struct MemoryStream {
    batches: Vec<Batch>,
    batch: usize,
    offset: usize,
    next_row: u64,
}

impl Iterator for MemoryStream {
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let batch = self.batches.get(self.batch)?;
            if let Some(record) = batch.get(self.offset) {
                self.offset += 1;
                let row = self.next_row;
                self.next_row += 1;
                return Some(Ok(RowRecord::new(row, record.clone())));
            }
            self.batch += 1;
            self.offset = 0;
        }
    }
}

/// Appends batches to a [`MemoryStore`]; rows are visible as soon as written
#[derive(Debug)]
pub struct MemoryWriter {
    batches: Arc<RwLock<Vec<Batch>>>,
    max_batch_rows: usize,
    rows: u64,
    written: usize,
}

impl RecordWriter for MemoryWriter {
    fn write_batch(&mut self, records: &[StoredRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let chunks: Vec<Batch> = records
            .chunks(self.max_batch_rows)
            .map(Batch::from)
            .collect();
        self.written += chunks.len();
        self.rows += records.len() as u64;
        self.batches.write().extend(chunks);
        Ok(())
    }

    fn finish(&mut self) -> Result<WriteSummary> {
        Ok(WriteSummary {
            rows: self.rows,
            batches: self.written,
            bytes: 0,
        })
    }
}
