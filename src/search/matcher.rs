use crate::error::{BklogError, Result};
use crate::record::StoredRecord;
use crate::search::SearchOptions;
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};

/// Compiled search predicate over record content
#[derive(Debug, Clone)]
pub struct RecordMatcher {
    matcher: RegexMatcher,
    invert: bool,
}

impl RecordMatcher {
    /// Compile `options.pattern`, case-insensitive unless `case_sensitive` is set
    pub fn new(options: &SearchOptions) -> Result<Self> {
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(!options.case_sensitive)
            .build(&options.pattern)
            .map_err(|e| BklogError::invalid_pattern(&options.pattern, e.to_string()))?;

        Ok(Self {
            matcher,
            invert: options.invert_match,
        })
    }

    /// Whether `record` is reported, after applying `invert_match`
    #[inline]
    pub fn is_match(&self, record: &StoredRecord) -> bool {
        let found = self
            .matcher
            .is_match(record.content.as_bytes())
            .unwrap_or(false);
        found != self.invert
    }
}
