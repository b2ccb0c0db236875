//! Regex search with context over a record store.
//!
//! Forward searches stream; reverse searches materialize rows `0..=start`
//! and walk them backwards, so their memory grows with the number of rows
//! searched. Both directions report the same set of matches.

pub mod context;
pub mod matcher;
pub mod options;

pub use matcher::RecordMatcher;
pub use options::{SearchOptions, SearchResult};

use crate::error::Result;
use crate::record::RowRecord;
use crate::store::{check_start_row, RecordStore, RecordStream};
use context::ContextCollector;

/// Start a search over `store`
///
/// The pattern is compiled before anything is read, so an invalid pattern
/// fails here without touching storage. A `seek_start` of 0 is always valid;
/// any other start at or past the last row is a row-out-of-range error.
pub fn search<S: RecordStore + ?Sized>(store: &S, options: &SearchOptions) -> Result<SearchIter> {
    let matcher = RecordMatcher::new(options)?;
    let (before, after) = options.context_window();
    let collector = ContextCollector::new(before, after);

    if options.reverse {
        let total = store.row_count()?;
        let start = options.seek_start.unwrap_or(total.saturating_sub(1));
        check_start_row(start, total)?;

        let rows = if total == 0 {
            Vec::new()
        } else {
            store
                .read_from(0)?
                .take(start as usize + 1)
                .collect::<Result<Vec<_>>>()?
        };
        log::debug!(
            "Reverse search for '{}' over {} rows",
            options.pattern,
            rows.len()
        );
        return Ok(SearchIter::Reverse(ReverseSearch {
            rows,
            matcher,
            collector,
            done: false,
        }));
    }

    let stream = store.read_from(options.seek_start.unwrap_or(0))?;
    log::debug!(
        "Forward search for '{}' from row {}",
        options.pattern,
        options.seek_start.unwrap_or(0)
    );
    Ok(SearchIter::Forward(ForwardSearch {
        stream,
        matcher,
        collector,
        done: false,
    }))
}

/// Streaming search in ascending row order
pub struct ForwardSearch {
    stream: RecordStream,
    matcher: RecordMatcher,
    collector: ContextCollector,
    done: bool,
}

impl Iterator for ForwardSearch {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.stream.next() {
                Some(Ok(row)) => {
                    let matched = self.matcher.is_match(&row.record);
                    if let Some(result) = self.collector.push(row, matched) {
                        return Some(Ok(result));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self.collector.finish().map(Ok);
                }
            }
        }
        None
    }
}

/// Search in descending row order over materialized rows
pub struct ReverseSearch {
    /// Ascending; popped from the back
    rows: Vec<RowRecord>,
    matcher: RecordMatcher,
    collector: ContextCollector,
    done: bool,
}

impl Iterator for ReverseSearch {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.rows.pop() {
                Some(row) => {
                    let matched = self.matcher.is_match(&row.record);
                    if let Some(result) = self.collector.push(row, matched) {
                        return Some(Ok(result));
                    }
                }
                None => {
                    self.done = true;
                    return self.collector.finish().map(Ok);
                }
            }
        }
        None
    }
}

/// Search results in either direction
pub enum SearchIter {
    Forward(ForwardSearch),
    Reverse(ReverseSearch),
}

impl Iterator for SearchIter {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SearchIter::Forward(search) => search.next(),
            SearchIter::Reverse(search) => search.next(),
        }
    }
}
