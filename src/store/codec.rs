//! Byte layout of the columnar record file.
//!
//! ```text
//! header   "BKLC" | version u16 | column count u16 | (name len u16, name, type u8)*
//! batch*   row count u32 | (block len u32, zstd block)*  one block per header column
//! footer   batch count u32 | (offset u64, rows u32)*
//! trailer  footer offset u64 | "BKLC"
//! ```
//!
//! All integers are little endian. Inside a block, int64 and int32 values are
//! packed back to back and utf8 values are length prefixed with a u32.
//!
//! A batch holds at most [`MAX_BATCH_ROWS`] rows and a column block
//! decompresses to at most [`MAX_COLUMN_BYTES`]. Readers check both before
//! allocating anything sized by the file.

use crate::error::{BklogError, Result};
use crate::record::{RecordFlags, StoredRecord};
use bytes::{Buf, BufMut};
use std::io::Read;

pub const MAGIC: &[u8; 4] = b"BKLC";
pub const FORMAT_VERSION: u16 = 1;

/// Trailer size: footer offset plus magic
pub const TRAILER_LEN: usize = 8 + MAGIC.len();

/// Largest row count of one batch
pub const MAX_BATCH_ROWS: u32 = 1 << 20;

/// Largest decompressed size of one column block
pub const MAX_COLUMN_BYTES: u64 = u32::MAX as u64;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const CONTENT_COLUMN: &str = "content";
pub const GROUP_COLUMN: &str = "group";
pub const FLAGS_COLUMN: &str = "flags";

/// Physical column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Int32,
    Utf8,
}

impl ColumnType {
    fn tag(self) -> u8 {
        match self {
            ColumnType::Int64 => 1,
            ColumnType::Int32 => 2,
            ColumnType::Utf8 => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ColumnType::Int64),
            2 => Some(ColumnType::Int32),
            3 => Some(ColumnType::Utf8),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column list stored in the file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::log_records()
    }
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// The four columns every writer produces by default
    pub fn log_records() -> Self {
        Self::new(vec![
            ColumnDef::new(TIMESTAMP_COLUMN, ColumnType::Int64),
            ColumnDef::new(CONTENT_COLUMN, ColumnType::Utf8),
            ColumnDef::new(GROUP_COLUMN, ColumnType::Utf8),
            ColumnDef::new(FLAGS_COLUMN, ColumnType::Int32),
        ])
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Writers can only fill record columns with their expected types
    pub fn check_writable(&self) -> Result<()> {
        for column in &self.columns {
            match expected_type(&column.name) {
                Some(expected) if expected == column.column_type => {}
                Some(expected) => {
                    return Err(BklogError::schema(format!(
                        "column '{}' must be {:?}, got {:?}",
                        column.name, expected, column.column_type
                    )))
                }
                None => {
                    return Err(BklogError::schema(format!(
                        "cannot write unknown column '{}'",
                        column.name
                    )))
                }
            }
        }
        Ok(())
    }
}

fn expected_type(name: &str) -> Option<ColumnType> {
    match name {
        TIMESTAMP_COLUMN => Some(ColumnType::Int64),
        CONTENT_COLUMN | GROUP_COLUMN => Some(ColumnType::Utf8),
        FLAGS_COLUMN => Some(ColumnType::Int32),
        _ => None,
    }
}

/// Positions of the record columns within a file's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: usize,
    pub content: usize,
    pub group: Option<usize>,
    pub flags: Option<usize>,
}

impl ColumnMap {
    /// Resolve record columns, rejecting missing required ones and wrong types
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let mut timestamp = None;
        let mut content = None;
        let mut group = None;
        let mut flags = None;

        for (index, column) in schema.columns().iter().enumerate() {
            let Some(expected) = expected_type(&column.name) else {
                log::debug!("Skipping unknown column '{}'", column.name);
                continue;
            };
            if expected != column.column_type {
                return Err(BklogError::schema(format!(
                    "column '{}' has type {:?}, expected {:?}",
                    column.name, column.column_type, expected
                )));
            }
            let slot = match column.name.as_str() {
                TIMESTAMP_COLUMN => &mut timestamp,
                CONTENT_COLUMN => &mut content,
                GROUP_COLUMN => &mut group,
                _ => &mut flags,
            };
            *slot = Some(index);
        }

        Ok(Self {
            timestamp: timestamp.ok_or_else(|| {
                BklogError::schema(format!("required column '{TIMESTAMP_COLUMN}' not found"))
            })?,
            content: content.ok_or_else(|| {
                BklogError::schema(format!("required column '{CONTENT_COLUMN}' not found"))
            })?,
            group,
            flags,
        })
    }
}

pub fn encode_header(schema: &Schema) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.put_slice(MAGIC);
    buf.put_u16_le(FORMAT_VERSION);
    buf.put_u16_le(schema.len() as u16);
    for column in schema.columns() {
        buf.put_u16_le(column.name.len() as u16);
        buf.put_slice(column.name.as_bytes());
        buf.put_u8(column.column_type.tag());
    }
    buf
}

/// Parse the header, returning the schema and the header length
pub fn decode_header(bytes: &[u8]) -> Result<(Schema, usize)> {
    let mut buf = bytes;
    ensure(&buf, MAGIC.len(), "header magic")?;
    if &buf[..MAGIC.len()] != MAGIC {
        return Err(BklogError::corrupt("not a bklog record file (bad magic)"));
    }
    buf.advance(MAGIC.len());

    let version = get_u16(&mut buf, "format version")?;
    if version != FORMAT_VERSION {
        return Err(BklogError::corrupt(format!(
            "unsupported format version {version}"
        )));
    }

    let count = get_u16(&mut buf, "column count")? as usize;
    let mut columns = Vec::with_capacity(count);
    for _ in 0..count {
        let name_len = get_u16(&mut buf, "column name length")? as usize;
        let name = get_str(&mut buf, name_len, "column name")?;
        let tag = get_u8(&mut buf, "column type")?;
        let column_type = ColumnType::from_tag(tag).ok_or_else(|| {
            BklogError::schema(format!("column '{name}' has unknown type tag {tag}"))
        })?;
        columns.push(ColumnDef::new(name, column_type));
    }

    Ok((Schema::new(columns), bytes.len() - buf.len()))
}

/// Encode one batch with every column compressed at `level`
pub fn encode_batch(schema: &Schema, records: &[StoredRecord], level: i32) -> Result<Vec<u8>> {
    let rows = u32::try_from(records.len())
        .ok()
        .filter(|rows| *rows <= MAX_BATCH_ROWS)
        .ok_or_else(|| {
            BklogError::other(format!(
                "batch of {} rows exceeds the limit of {MAX_BATCH_ROWS}",
                records.len()
            ))
        })?;
    let mut buf = Vec::new();
    buf.put_u32_le(rows);

    for column in schema.columns() {
        let raw = encode_column(&column.name, records)?;
        if raw.len() as u64 > MAX_COLUMN_BYTES {
            return Err(BklogError::other(format!(
                "column '{}' holds {} bytes, over the {MAX_COLUMN_BYTES} byte block limit",
                column.name,
                raw.len()
            )));
        }
        let block = zstd::stream::encode_all(raw.as_slice(), level)
            .map_err(|e| BklogError::file_error("Failed to compress column block", e))?;
        buf.put_u32_le(length_u32(block.len(), "compressed column block")?);
        buf.put_slice(&block);
    }

    Ok(buf)
}

fn encode_column(name: &str, records: &[StoredRecord]) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    match name {
        TIMESTAMP_COLUMN => records
            .iter()
            .for_each(|record| raw.put_i64_le(record.timestamp_ms)),
        FLAGS_COLUMN => records
            .iter()
            .for_each(|record| raw.put_i32_le(record.flags.bits() as i32)),
        CONTENT_COLUMN => {
            for record in records {
                put_str(&mut raw, &record.content)?;
            }
        }
        GROUP_COLUMN => {
            for record in records {
                put_str(&mut raw, &record.group)?;
            }
        }
        _ => {}
    }
    Ok(raw)
}

/// Decode the batch starting at the front of `bytes`
///
/// `expected_rows` comes from the footer; a batch that disagrees is corrupt.
/// The fixed-width timestamp column is decompressed first and must hold
/// exactly eight bytes per row before any record is allocated.
pub fn decode_batch(
    bytes: &[u8],
    schema: &Schema,
    map: &ColumnMap,
    expected_rows: u32,
) -> Result<Vec<StoredRecord>> {
    let mut buf = bytes;
    let rows = get_u32(&mut buf, "batch row count")?;
    if rows != expected_rows {
        return Err(BklogError::corrupt(format!(
            "batch holds {rows} rows, footer says {expected_rows}"
        )));
    }
    check_batch_rows(rows)?;

    let mut blocks = Vec::with_capacity(schema.len());
    for _ in schema.columns() {
        let block_len = get_u32(&mut buf, "column block length")? as usize;
        ensure(&buf, block_len, "column block")?;
        blocks.push(&buf[..block_len]);
        buf.advance(block_len);
    }

    let rows = rows as usize;
    let timestamps = decompress(blocks[map.timestamp], TIMESTAMP_COLUMN, rows as u64 * 8)?;
    if timestamps.len() != rows * 8 {
        return Err(BklogError::corrupt(format!(
            "column '{TIMESTAMP_COLUMN}' holds {} bytes for {rows} rows",
            timestamps.len()
        )));
    }
    let mut records = vec![StoredRecord::default(); rows];
    decode_column(TIMESTAMP_COLUMN, &timestamps, &mut records)?;
    drop(timestamps);

    let content = decompress(blocks[map.content], CONTENT_COLUMN, MAX_COLUMN_BYTES)?;
    decode_column(CONTENT_COLUMN, &content, &mut records)?;
    drop(content);

    if let Some(index) = map.group {
        let group = decompress(blocks[index], GROUP_COLUMN, MAX_COLUMN_BYTES)?;
        decode_column(GROUP_COLUMN, &group, &mut records)?;
    }
    if let Some(index) = map.flags {
        let flags = decompress(blocks[index], FLAGS_COLUMN, rows as u64 * 4)?;
        decode_column(FLAGS_COLUMN, &flags, &mut records)?;
    }

    Ok(records)
}

/// Reject row counts no writer produces
pub fn check_batch_rows(rows: u32) -> Result<()> {
    if rows == 0 || rows > MAX_BATCH_ROWS {
        return Err(BklogError::corrupt(format!(
            "batch row count {rows} outside 1..={MAX_BATCH_ROWS}"
        )));
    }
    Ok(())
}

/// Decompress one column block, failing once it grows past `limit` bytes
fn decompress(block: &[u8], name: &str, limit: u64) -> Result<Vec<u8>> {
    let failed = |e: std::io::Error| {
        BklogError::corrupt(format!("column '{name}' failed to decompress: {e}"))
    };
    let decoder = zstd::stream::read::Decoder::with_buffer(block).map_err(failed)?;
    let mut raw = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut raw)
        .map_err(failed)?;
    if raw.len() as u64 > limit {
        return Err(BklogError::corrupt(format!(
            "column '{name}' decompresses past {limit} bytes"
        )));
    }
    Ok(raw)
}

fn decode_column(name: &str, raw: &[u8], records: &mut [StoredRecord]) -> Result<()> {
    let mut buf = raw;
    for record in records.iter_mut() {
        match name {
            TIMESTAMP_COLUMN => record.timestamp_ms = get_i64(&mut buf, name)?,
            FLAGS_COLUMN => record.flags = RecordFlags::from_bits(get_i32(&mut buf, name)? as u32),
            CONTENT_COLUMN => {
                let len = get_u32(&mut buf, name)? as usize;
                record.content = get_str(&mut buf, len, name)?;
            }
            GROUP_COLUMN => {
                let len = get_u32(&mut buf, name)? as usize;
                record.group = get_str(&mut buf, len, name)?;
            }
            _ => return Ok(()),
        }
    }
    if buf.has_remaining() {
        return Err(BklogError::corrupt(format!(
            "column '{name}' has {} trailing bytes",
            buf.remaining()
        )));
    }
    Ok(())
}

/// One footer entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEntry {
    pub offset: u64,
    pub rows: u32,
}

pub fn encode_footer(batches: &[BatchEntry]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + batches.len() * 12);
    buf.put_u32_le(batches.len() as u32);
    for batch in batches {
        buf.put_u64_le(batch.offset);
        buf.put_u32_le(batch.rows);
    }
    buf
}

pub fn decode_footer(bytes: &[u8]) -> Result<Vec<BatchEntry>> {
    let mut buf = bytes;
    let count = get_u32(&mut buf, "batch count")? as usize;
    ensure(&buf, count.saturating_mul(12), "batch index")?;
    let mut batches = Vec::with_capacity(count);
    for _ in 0..count {
        batches.push(BatchEntry {
            offset: buf.get_u64_le(),
            rows: buf.get_u32_le(),
        });
    }
    Ok(batches)
}

pub fn encode_trailer(footer_offset: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TRAILER_LEN);
    buf.put_u64_le(footer_offset);
    buf.put_slice(MAGIC);
    buf
}

/// Footer offset stored in the last [`TRAILER_LEN`] bytes
pub fn decode_trailer(bytes: &[u8]) -> Result<u64> {
    if bytes.len() < TRAILER_LEN {
        return Err(BklogError::corrupt("file too short for trailer"));
    }
    let mut buf = &bytes[bytes.len() - TRAILER_LEN..];
    let footer_offset = buf.get_u64_le();
    if buf != MAGIC {
        return Err(BklogError::corrupt("missing trailer magic (truncated file?)"));
    }
    Ok(footer_offset)
}

fn put_str(buf: &mut Vec<u8>, value: &str) -> Result<()> {
    buf.put_u32_le(length_u32(value.len(), "string value")?);
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn length_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| BklogError::other(format!("{what} of {len} bytes is too large")))
}

fn ensure(buf: &&[u8], needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(BklogError::corrupt(format!(
            "unexpected end of data reading {what}"
        )));
    }
    Ok(())
}

fn get_u8(buf: &mut &[u8], what: &str) -> Result<u8> {
    ensure(buf, 1, what)?;
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut &[u8], what: &str) -> Result<u16> {
    ensure(buf, 2, what)?;
    Ok(buf.get_u16_le())
}

fn get_u32(buf: &mut &[u8], what: &str) -> Result<u32> {
    ensure(buf, 4, what)?;
    Ok(buf.get_u32_le())
}

fn get_i32(buf: &mut &[u8], what: &str) -> Result<i32> {
    ensure(buf, 4, what)?;
    Ok(buf.get_i32_le())
}

fn get_i64(buf: &mut &[u8], what: &str) -> Result<i64> {
    ensure(buf, 8, what)?;
    Ok(buf.get_i64_le())
}

fn get_str(buf: &mut &[u8], len: usize, what: &str) -> Result<String> {
    ensure(buf, len, what)?;
    let value = std::str::from_utf8(&buf[..len])
        .map_err(|e| BklogError::corrupt(format!("invalid UTF-8 in {what}: {e}")))?
        .to_string();
    buf.advance(len);
    Ok(value)
}
