//! Group tracking for a single parse session.
//!
//! A [`GroupTracker`] remembers the most recent group header and stamps it onto
//! every entry it tokenizes. Trackers are cheap and never shared: every file,
//! thread or iteration creates its own, so group state cannot leak between
//! independent parses.

use crate::config::IngestConfig;
use crate::error::Result;
use crate::parser::lines::LineSplitter;
use crate::parser::tokenizer::{tokenize, ParsedEntry};
use std::io::BufRead;

/// Session-scoped group state
#[derive(Debug, Default, Clone)]
pub struct GroupTracker {
    current_group: String,
}

impl GroupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the current group onto `entry`, opening a new group on headers
    pub fn track(&mut self, mut entry: ParsedEntry) -> ParsedEntry {
        if entry.is_group_header() {
            self.current_group.clone_from(&entry.content);
        }
        entry.group.clone_from(&self.current_group);
        entry
    }

    /// Tokenize one physical line within this session
    pub fn parse_line(&mut self, raw: &[u8]) -> ParsedEntry {
        self.track(tokenize(raw))
    }

    /// Group that the next non-header line would join
    pub fn current_group(&self) -> &str {
        &self.current_group
    }

    /// Forget the current group
    pub fn reset(&mut self) {
        self.current_group.clear();
    }

    /// Iterate the entries of `reader` with a fresh tracker
    pub fn entries<R: BufRead>(reader: R, config: &IngestConfig) -> Entries<R> {
        Entries::new(reader, config.max_line_bytes)
    }
}

/// Read and tokenize every line of `reader` in a fresh session
pub fn parse_reader<R: BufRead>(reader: R) -> Entries<R> {
    Entries::new(reader, IngestConfig::default().max_line_bytes)
}

/// Iterator over the tokenized lines of a reader
///
/// Lines are split on `\n` with one trailing `\r` removed. A read failure or
/// an over-long line is yielded once, after which the iterator is exhausted.
pub struct Entries<R> {
    reader: R,
    tracker: GroupTracker,
    lines: LineSplitter,
    done: bool,
}

impl<R: BufRead> Entries<R> {
    fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            tracker: GroupTracker::new(),
            lines: LineSplitter::new(max_line_bytes),
            done: false,
        }
    }

    /// Lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.lines.lines_read()
    }

    fn read_next(&mut self) -> Result<Option<ParsedEntry>> {
        match self.lines.read_line(&mut self.reader)? {
            Some(line) => Ok(Some(self.tracker.parse_line(line))),
            None => Ok(None),
        }
    }
}

impl<R: BufRead> Iterator for Entries<R> {
    type Item = Result<ParsedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
