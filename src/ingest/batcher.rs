//! Turns physical lines into batches of stored records.

use crate::config::IngestConfig;
use crate::parser::tokenizer::ENVELOPE_PREFIX;
use crate::parser::GroupTracker;
use crate::record::StoredRecord;
use crate::store::WriteSummary;

/// Predicate deciding which records are kept
pub type RecordFilter = Box<dyn Fn(&StoredRecord) -> bool + Send>;

/// Counters gathered while ingesting one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Physical lines read
    pub lines: u64,
    /// Records kept after filtering
    pub records: u64,
    /// Kept records carrying a timestamp
    pub timestamped: u64,
    /// Kept records that open a group
    pub group_headers: u64,
    /// Lines that started with an envelope but yielded no timestamp
    pub recovered_envelopes: u64,
    /// Batches handed to the writer
    pub batches: u64,
    /// What the writer reported on finish
    pub write: WriteSummary,
}

/// Per-source line accumulator
///
/// Owns the source's [`GroupTracker`], so every ingestion has isolated group
/// state. Filtered-out lines still move the tracker: a dropped header still
/// names the group of the lines that follow it.
pub struct LineBatcher {
    tracker: GroupTracker,
    batch: Vec<StoredRecord>,
    batch_size: usize,
    filter: Option<RecordFilter>,
    summary: IngestSummary,
}

impl LineBatcher {
    pub fn new(config: &IngestConfig) -> Self {
        let batch_size = config.batch_size.max(1);
        Self {
            tracker: GroupTracker::new(),
            batch: Vec::with_capacity(batch_size),
            batch_size,
            filter: None,
            summary: IngestSummary::default(),
        }
    }

    /// Keep only records accepted by `filter`
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&StoredRecord) -> bool + Send + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Add one physical line, returning a batch once `batch_size` records are buffered
    ///
    /// `line` comes without its line ending, as produced by
    /// [`LineSplitter`](crate::parser::LineSplitter), which also enforces the
    /// line length limit.
    pub fn push_line(&mut self, line: &[u8]) -> Option<Vec<StoredRecord>> {
        self.summary.lines += 1;
        let entry = self.tracker.parse_line(line);
        if !entry.has_timestamp() && line.starts_with(ENVELOPE_PREFIX) {
            self.summary.recovered_envelopes += 1;
        }

        let record = StoredRecord::from(entry);
        if let Some(filter) = &self.filter {
            if !filter(&record) {
                return None;
            }
        }

        self.summary.records += 1;
        if record.has_timestamp() {
            self.summary.timestamped += 1;
        }
        if record.is_group_header() {
            self.summary.group_headers += 1;
        }
        self.batch.push(record);

        if self.batch.len() >= self.batch_size {
            self.take_batch()
        } else {
            None
        }
    }

    /// Remaining buffered records, if any
    pub fn flush(&mut self) -> Option<Vec<StoredRecord>> {
        self.take_batch()
    }

    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    /// Final counters, with the writer's summary attached
    pub fn into_summary(mut self, write: WriteSummary) -> IngestSummary {
        self.summary.write = write;
        if self.summary.recovered_envelopes > 0 {
            log::warn!(
                "{} lines had a malformed timestamp envelope and were stored untimed",
                self.summary.recovered_envelopes
            );
        }
        self.summary
    }

    fn take_batch(&mut self) -> Option<Vec<StoredRecord>> {
        if self.batch.is_empty() {
            return None;
        }
        self.summary.batches += 1;
        Some(std::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.batch_size),
        ))
    }
}
