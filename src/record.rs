//! Persisted record types.
//!
//! A [`StoredRecord`] is what the record store keeps for each log line. Row
//! ordinals are not stored; readers derive them from batch position and pair
//! them with the record in a [`RowRecord`].

use crate::parser::ansi::strip_ansi;
use crate::parser::tokenizer::ParsedEntry;
use chrono::{DateTime, Utc};
use std::fmt;

/// Display name used for records outside any group
pub const NO_GROUP: &str = "<no group>";

/// Per-record bitset
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RecordFlags(u32);

impl RecordFlags {
    pub const HAS_TIMESTAMP: RecordFlags = RecordFlags(1 << 0);
    pub const IS_GROUP_HEADER: RecordFlags = RecordFlags(1 << 1);

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Keep every bit; unknown bits written by newer writers survive a round trip
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: RecordFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RecordFlags) {
        self.0 |= other.0;
    }
}

impl fmt::Debug for RecordFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::HAS_TIMESTAMP) {
            names.push("HAS_TIMESTAMP");
        }
        if self.contains(Self::IS_GROUP_HEADER) {
            names.push("IS_GROUP_HEADER");
        }
        write!(f, "RecordFlags({:#x}: {})", self.0, names.join(" | "))
    }
}

/// One persisted log line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredRecord {
    /// Epoch milliseconds, 0 when the line had no timestamp
    pub timestamp_ms: i64,
    pub content: String,
    /// Empty string is the canonical "no group"
    pub group: String,
    pub flags: RecordFlags,
}

impl StoredRecord {
    pub fn from_entry(entry: &ParsedEntry) -> Self {
        Self {
            timestamp_ms: entry.timestamp_ms.unwrap_or(0),
            content: entry.content.clone(),
            group: entry.group.clone(),
            flags: entry.flags(),
        }
    }

    pub fn has_timestamp(&self) -> bool {
        self.flags.contains(RecordFlags::HAS_TIMESTAMP)
    }

    pub fn is_group_header(&self) -> bool {
        self.flags.contains(RecordFlags::IS_GROUP_HEADER)
    }

    /// Timestamp as a UTC instant, `None` for untimed records
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if self.has_timestamp() {
            DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms)
        } else {
            None
        }
    }

    /// Group name with the empty group shown as [`NO_GROUP`]
    pub fn display_group(&self) -> &str {
        if self.group.is_empty() {
            NO_GROUP
        } else {
            &self.group
        }
    }

    /// Content for display: optionally escape-stripped, always trimmed
    pub fn clean_content(&self, strip_escapes: bool) -> String {
        clean(&self.content, strip_escapes)
    }

    /// Group for display: optionally escape-stripped, always trimmed
    pub fn clean_group(&self, strip_escapes: bool) -> String {
        clean(&self.group, strip_escapes)
    }
}

impl From<ParsedEntry> for StoredRecord {
    fn from(entry: ParsedEntry) -> Self {
        let flags = entry.flags();
        Self {
            timestamp_ms: entry.timestamp_ms.unwrap_or(0),
            content: entry.content,
            group: entry.group,
            flags,
        }
    }
}

fn clean(text: &str, strip_escapes: bool) -> String {
    if strip_escapes {
        strip_ansi(text).trim().to_string()
    } else {
        text.trim().to_string()
    }
}

/// A record together with its absolute row ordinal
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowRecord {
    pub row: u64,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub record: StoredRecord,
}

impl RowRecord {
    pub fn new(row: u64, record: StoredRecord) -> Self {
        Self { row, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GroupTracker;

    #[test]
    fn test_flags_bits() {
        let mut flags = RecordFlags::empty();
        assert!(!flags.contains(RecordFlags::HAS_TIMESTAMP));
        flags.insert(RecordFlags::HAS_TIMESTAMP);
        flags.insert(RecordFlags::IS_GROUP_HEADER);
        assert_eq!(flags.bits(), 0b11);
        assert_eq!(RecordFlags::from_bits(0b10), RecordFlags::IS_GROUP_HEADER);
    }

    #[test]
    fn test_from_entry() {
        let mut tracker = GroupTracker::new();
        let header = StoredRecord::from(tracker.parse_line(b"\x1b_bk;t=1\x07~~~ setup"));
        let plain = StoredRecord::from(tracker.parse_line(b"untimed"));

        assert_eq!(header.timestamp_ms, 1);
        assert!(header.has_timestamp());
        assert!(header.is_group_header());
        assert_eq!(header.group, "~~~ setup");

        assert_eq!(plain.timestamp_ms, 0);
        assert!(!plain.has_timestamp());
        assert!(plain.timestamp().is_none());
        assert_eq!(plain.group, "~~~ setup");
    }

    #[test]
    fn test_zero_timestamp_is_still_timed() {
        let record = StoredRecord::from(crate::parser::tokenize(b"\x1b_bk;t=0\x07epoch"));
        assert!(record.has_timestamp());
        assert_eq!(record.timestamp().map(|ts| ts.timestamp_millis()), Some(0));
    }

    #[test]
    fn test_display_group() {
        let record = StoredRecord::default();
        assert_eq!(record.display_group(), NO_GROUP);
    }

    #[test]
    fn test_clean_methods() {
        let record = StoredRecord {
            content: "  \x1b[31m  red text  \x1b[0m  ".to_string(),
            group: "\n  \x1b[32mgreen group\x1b[0m \t ".to_string(),
            ..StoredRecord::default()
        };
        assert_eq!(record.clean_content(true), "red text");
        assert_eq!(record.clean_group(true), "green group");
        assert_eq!(record.clean_content(false), "\x1b[31m  red text  \x1b[0m");

        let plain = StoredRecord {
            content: "  \t  hello world  \n  ".to_string(),
            ..StoredRecord::default()
        };
        assert_eq!(plain.clean_content(false), "hello world");
    }
}
