//! Columnar record file: batched, zstd-compressed column blocks.
//!
//! [`ColumnarWriter`] streams batches into a temporary file next to the target
//! and renames it into place on [`RecordWriter::finish`], so readers never see
//! a half-written file. [`ColumnarStore`] reads the footer once and reopens
//! the file for every stream; small files are read into memory and large ones
//! are memory mapped.

use crate::config::StoreConfig;
use crate::error::{BklogError, Result};
use crate::record::{RowRecord, StoredRecord};
use crate::store::codec::{self, BatchEntry, ColumnMap, Schema};
use crate::store::validation::validate_file_path;
use crate::store::{check_start_row, FileInfo, RecordStore, RecordStream, RecordWriter, WriteSummary};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Writes a columnar record file
pub struct ColumnarWriter {
    file: Option<BufWriter<NamedTempFile>>,
    target: PathBuf,
    schema: Schema,
    compression_level: i32,
    batches: Vec<BatchEntry>,
    offset: u64,
    rows: u64,
}

impl ColumnarWriter {
    /// Start a file at `path` with the default record schema
    pub fn create(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        Self::with_schema(path, config, Schema::log_records())
    }

    /// Start a file with an explicit column subset
    ///
    /// Every column must be one of the record columns with its usual type.
    /// Readers reject files whose schema lacks `timestamp` or `content`.
    pub fn with_schema(path: impl AsRef<Path>, config: &StoreConfig, schema: Schema) -> Result<Self> {
        schema.check_writable()?;
        let target = path.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let temp = NamedTempFile::new_in(&dir).map_err(|e| {
            BklogError::file_error(
                format!("Failed to create temp file in {}", dir.display()),
                e,
            )
        })?;
        let mut file = BufWriter::new(temp);
        let header = codec::encode_header(&schema);
        file.write_all(&header)
            .map_err(|e| BklogError::file_error("Failed to write file header", e))?;

        log::debug!("Writing record file {}", target.display());
        Ok(Self {
            file: Some(file),
            target,
            schema,
            compression_level: config.compression_level,
            batches: Vec::new(),
            offset: header.len() as u64,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.target
    }

    /// Write one batch of at most [`codec::MAX_BATCH_ROWS`] records
    fn write_chunk(&mut self, records: &[StoredRecord]) -> Result<()> {
        let bytes = codec::encode_batch(&self.schema, records, self.compression_level)?;
        self.file_mut()?
            .write_all(&bytes)
            .map_err(|e| BklogError::file_error("Failed to write record batch", e))?;

        let rows = records.len() as u32;
        self.batches.push(BatchEntry {
            offset: self.offset,
            rows,
        });
        self.offset += bytes.len() as u64;
        self.rows += rows as u64;
        Ok(())
    }

    fn file_mut(&mut self) -> Result<&mut BufWriter<NamedTempFile>> {
        self.file
            .as_mut()
            .ok_or_else(|| BklogError::other("record writer already finished"))
    }
}

impl RecordWriter for ColumnarWriter {
    fn write_batch(&mut self, records: &[StoredRecord]) -> Result<()> {
        for chunk in records.chunks(codec::MAX_BATCH_ROWS as usize) {
            self.write_chunk(chunk)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<WriteSummary> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| BklogError::other("record writer already finished"))?;

        let footer_offset = self.offset;
        file.write_all(&codec::encode_footer(&self.batches))
            .and_then(|_| file.write_all(&codec::encode_trailer(footer_offset)))
            .map_err(|e| BklogError::file_error("Failed to write file footer", e))?;

        let temp = file
            .into_inner()
            .map_err(|e| BklogError::file_error("Failed to flush record file", e.into_error()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| BklogError::file_error("Failed to sync record file", e))?;
        let persisted = temp.persist(&self.target).map_err(|e| {
            BklogError::file_error(
                format!("Failed to move record file into {}", self.target.display()),
                e.error,
            )
        })?;
        let bytes = persisted
            .metadata()
            .map_err(|e| BklogError::file_error("Failed to read file metadata", e))?
            .len();

        let summary = WriteSummary {
            rows: self.rows,
            batches: self.batches.len(),
            bytes,
        };
        log::info!(
            "Wrote {} rows in {} batches ({} bytes) to {}",
            summary.rows,
            summary.batches,
            summary.bytes,
            self.target.display()
        );
        Ok(summary)
    }
}

/// Where an opened file's bytes live
#[derive(Debug)]
enum ByteSource {
    /// Whole file read into memory (below the configured threshold)
    InMemory(Vec<u8>),
    /// Memory mapped file
    MemoryMapped(Mmap),
}

impl ByteSource {
    fn as_bytes(&self) -> &[u8] {
        match self {
            ByteSource::InMemory(vec) => vec.as_slice(),
            ByteSource::MemoryMapped(mmap) => &mmap[..],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BatchIndex {
    offset: usize,
    end: usize,
    row_start: u64,
    rows: u32,
}

/// An opened, validated columnar file
#[derive(Debug)]
pub struct ColumnarFile {
    source: ByteSource,
    schema: Schema,
    columns: ColumnMap,
    batches: Vec<BatchIndex>,
    total_rows: u64,
}

impl ColumnarFile {
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        let file_size = validate_file_path(path)?;
        if file_size == 0 {
            return Err(BklogError::corrupt(format!(
                "record file is empty: {}",
                path.display()
            )));
        }

        let mut file = File::open(path).map_err(|e| {
            BklogError::file_error(format!("Failed to open file: {}", path.display()), e)
        })?;

        let source = if file_size < config.memory_threshold {
            let mut content = Vec::with_capacity(file_size as usize);
            file.read_to_end(&mut content)
                .map_err(|e| BklogError::file_error("Failed to read file", e))?;
            ByteSource::InMemory(content)
        } else {
            // SAFETY: record files are immutable once persisted; writers only
            // ever replace them by rename.
            let mmap = unsafe {
                Mmap::map(&file).map_err(|e| {
                    BklogError::file_error(
                        format!("Failed to memory map file: {}", path.display()),
                        e,
                    )
                })?
            };
            // Queries stream batches front to back
            #[cfg(unix)]
            {
                if let Err(e) = mmap.advise(memmap2::Advice::Sequential) {
                    log::warn!("Failed to set mmap advice for {}: {e}", path.display());
                }
            }
            ByteSource::MemoryMapped(mmap)
        };

        Self::from_source(source)
    }

    fn from_source(source: ByteSource) -> Result<Self> {
        let bytes = source.as_bytes();
        let (schema, header_len) = codec::decode_header(bytes)?;
        let columns = ColumnMap::resolve(&schema)?;

        let footer_offset = codec::decode_trailer(bytes)?;
        let footer_end = bytes.len() - codec::TRAILER_LEN;
        let footer_start = usize::try_from(footer_offset)
            .ok()
            .filter(|offset| (header_len..=footer_end).contains(offset))
            .ok_or_else(|| BklogError::corrupt(format!("footer offset {footer_offset} out of range")))?;
        let entries = codec::decode_footer(&bytes[footer_start..footer_end])?;

        let mut batches = Vec::with_capacity(entries.len());
        let mut row_start = 0u64;
        for (index, entry) in entries.iter().enumerate() {
            let end = entries
                .get(index + 1)
                .map_or(footer_offset, |next| next.offset);
            let offset = usize::try_from(entry.offset).unwrap_or(usize::MAX);
            let end = usize::try_from(end).unwrap_or(usize::MAX);
            if offset < header_len || offset >= end || end > footer_start {
                return Err(BklogError::corrupt(format!(
                    "batch {index} spans invalid range {offset}..{end}"
                )));
            }
            codec::check_batch_rows(entry.rows)?;
            batches.push(BatchIndex {
                offset,
                end,
                row_start,
                rows: entry.rows,
            });
            row_start += entry.rows as u64;
        }

        Ok(Self {
            source,
            schema,
            columns,
            batches,
            total_rows: row_start,
        })
    }

    pub fn row_count(&self) -> u64 {
        self.total_rows
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            row_count: self.total_rows,
            column_count: self.schema.len(),
            file_size: self.source.as_bytes().len() as u64,
            num_batches: self.batches.len(),
        }
    }

    fn decode_batch(&self, index: usize) -> Result<Vec<StoredRecord>> {
        let batch = &self.batches[index];
        let bytes = &self.source.as_bytes()[batch.offset..batch.end];
        codec::decode_batch(bytes, &self.schema, &self.columns, batch.rows)
    }

    /// Batch holding `row`
    fn batch_for_row(&self, row: u64) -> usize {
        self.batches
            .partition_point(|batch| batch.row_start + batch.rows as u64 <= row)
    }

    /// Consume the file into a stream starting at `start_row`
    pub fn into_rows(self, start_row: u64) -> Result<RowStream> {
        check_start_row(start_row, self.total_rows)?;
        let next_batch = self.batch_for_row(start_row);
        let skip = self
            .batches
            .get(next_batch)
            .map_or(0, |batch| (start_row - batch.row_start) as usize);

        Ok(RowStream {
            current: Vec::new().into_iter(),
            next_row: start_row,
            next_batch,
            skip,
            failed: false,
            file: self,
        })
    }
}

/// Lazy row stream over an owned [`ColumnarFile`]
///
/// One batch is decoded at a time. Fields drop in declaration order, so the
/// decoded batch is released before the file bytes.
pub struct RowStream {
    current: std::vec::IntoIter<StoredRecord>,
    next_row: u64,
    next_batch: usize,
    skip: usize,
    failed: bool,
    file: ColumnarFile,
}

impl Iterator for RowStream {
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(record) = self.current.next() {
                let row = self.next_row;
                self.next_row += 1;
                return Some(Ok(RowRecord::new(row, record)));
            }
            if self.next_batch >= self.file.batches.len() {
                return None;
            }

            match self.file.decode_batch(self.next_batch) {
                Ok(mut records) => {
                    self.next_batch += 1;
                    if self.skip > 0 {
                        records.drain(..self.skip.min(records.len()));
                        self.skip = 0;
                    }
                    self.current = records.into_iter();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// [`RecordStore`] over a columnar file on disk
///
/// The footer is validated once at open and its counts are kept, so
/// `row_count` and `info` never touch the file again. Every stream opens the
/// file anew and owns its bytes.
#[derive(Debug, Clone)]
pub struct ColumnarStore {
    path: PathBuf,
    config: StoreConfig,
    info: FileInfo,
}

impl ColumnarStore {
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = ColumnarFile::open(&path, config)?;
        let info = file.info();
        log::debug!(
            "Opened {} ({} rows, {} batches)",
            path.display(),
            info.row_count,
            info.num_batches
        );
        Ok(Self {
            path,
            config: config.clone(),
            info,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for ColumnarStore {
    fn row_count(&self) -> Result<u64> {
        Ok(self.info.row_count)
    }

    fn read_from(&self, start_row: u64) -> Result<RecordStream> {
        let file = ColumnarFile::open(&self.path, &self.config)?;
        Ok(Box::new(file.into_rows(start_row)?))
    }

    fn info(&self) -> Result<FileInfo> {
        Ok(self.info)
    }
}
