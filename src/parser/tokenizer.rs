//! Byte-level tokenizer for timestamped log lines.
//!
//! The build agent prefixes every physical line with an APC envelope carrying
//! the wall-clock time in epoch milliseconds:
//!
//! ```text
//! ESC _bk;t=1745322209921 BEL content...
//! ```
//!
//! The tokenizer is total: any byte sequence produces an entry. Lines without
//! an envelope, with an unterminated envelope or with an unparsable timestamp
//! degrade to untimed content instead of failing.

use crate::record::RecordFlags;
use bstr::ByteSlice;
use chrono::{DateTime, Utc};
use memchr::{memchr, memmem};

/// `ESC _bk;t=`
pub const ENVELOPE_PREFIX: &[u8] = b"\x1b_bk;t=";

const BEL: u8 = 0x07;

/// Shortest line that can hold an envelope: `ESC _bk;t=1 BEL`
const MIN_ENVELOPE_LEN: usize = ENVELOPE_PREFIX.len() + 2;

/// Prefixes that open a named section of the log
pub const GROUP_HEADER_PREFIXES: [&str; 3] = ["~~~ ", "--- ", "+++ "];

/// One tokenized physical line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedEntry {
    /// Epoch milliseconds from the envelope, if one parsed
    pub timestamp_ms: Option<i64>,

    /// Text after the envelope, or the whole line when there is none
    pub content: String,

    /// The physical line exactly as read
    pub raw: Vec<u8>,

    /// Nearest preceding group header, assigned by a session
    pub group: String,
}

impl ParsedEntry {
    pub fn has_timestamp(&self) -> bool {
        self.timestamp_ms.is_some()
    }

    pub fn is_group_header(&self) -> bool {
        is_group_header(&self.content)
    }

    /// Timestamp as a UTC instant
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp_ms.and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn flags(&self) -> RecordFlags {
        let mut flags = RecordFlags::empty();
        if self.has_timestamp() {
            flags.insert(RecordFlags::HAS_TIMESTAMP);
        }
        if self.is_group_header() {
            flags.insert(RecordFlags::IS_GROUP_HEADER);
        }
        flags
    }
}

/// True when `content` opens a new group (`~~~ `, `--- ` or `+++ `)
pub fn is_group_header(content: &str) -> bool {
    GROUP_HEADER_PREFIXES
        .iter()
        .any(|prefix| content.starts_with(prefix))
}

/// Tokenize one physical line (without its trailing newline)
pub fn tokenize(raw: &[u8]) -> ParsedEntry {
    let (timestamp_ms, content) = split_envelope(raw);
    ParsedEntry {
        timestamp_ms,
        content: content.to_str_lossy().into_owned(),
        raw: raw.to_vec(),
        group: String::new(),
    }
}

/// Split a line into its timestamp and content bytes
///
/// Content after a valid envelope stops before any second envelope on the
/// same line; only the first update of a multiplexed line is kept.
pub fn split_envelope(raw: &[u8]) -> (Option<i64>, &[u8]) {
    if raw.len() < MIN_ENVELOPE_LEN || !raw.starts_with(ENVELOPE_PREFIX) {
        return (None, raw);
    }

    let digits_start = ENVELOPE_PREFIX.len();
    let Some(bel) = memchr(BEL, &raw[digits_start..]).map(|offset| digits_start + offset) else {
        return (None, raw);
    };

    let timestamp_ms = parse_millis(&raw[digits_start..bel]);
    let mut content = &raw[bel + 1..];
    if let Some(next) = memmem::find(content, ENVELOPE_PREFIX) {
        content = &content[..next];
    }

    (timestamp_ms, content)
}

fn parse_millis(digits: &[u8]) -> Option<i64> {
    std::str::from_utf8(digits).ok()?.parse::<i64>().ok()
}
