use crate::record::RowRecord;

/// Options controlling one search
///
/// Built with [`SearchOptions::new`] and the chained setters:
///
/// ```
/// use bklog::search::SearchOptions;
///
/// let options = SearchOptions::new("error").context(2).reverse(true);
/// assert_eq!(options.context_window(), (2, 2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SearchOptions {
    /// Regex tested against each record's content
    pub pattern: String,
    /// Match case exactly; searches are case-insensitive by default
    pub case_sensitive: bool,
    /// Report records that do not match instead
    pub invert_match: bool,
    /// Non-matching records kept ahead of each match
    pub before_context: usize,
    /// Non-matching records collected after each match
    pub after_context: usize,
    /// Overrides both context sides when set
    pub context: Option<usize>,
    /// Walk from the end towards row 0
    pub reverse: bool,
    /// Row to start from instead of the first (forward) or last (reverse) row
    pub seek_start: Option<u64>,
}

impl SearchOptions {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn invert_match(mut self, invert_match: bool) -> Self {
        self.invert_match = invert_match;
        self
    }

    pub fn before_context(mut self, lines: usize) -> Self {
        self.before_context = lines;
        self
    }

    pub fn after_context(mut self, lines: usize) -> Self {
        self.after_context = lines;
        self
    }

    pub fn context(mut self, lines: usize) -> Self {
        self.context = Some(lines);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn seek_start(mut self, row: u64) -> Self {
        self.seek_start = Some(row);
        self
    }

    /// Effective `(before, after)` context sizes
    pub fn context_window(&self) -> (usize, usize) {
        match self.context {
            Some(lines) => (lines, lines),
            None => (self.before_context, self.after_context),
        }
    }
}

/// One match with its surrounding records
///
/// Context lists are in walk order and never contain a matching record: for a
/// forward search `before` ascends towards the match and `after` continues
/// from it; a reverse search mirrors both, drawing `before` from higher rows.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchResult {
    pub matched: RowRecord,
    pub before: Vec<RowRecord>,
    pub after: Vec<RowRecord>,
}

impl SearchResult {
    /// Row ordinal of the matching record
    pub fn row(&self) -> u64 {
        self.matched.row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = SearchOptions::new("fail")
            .case_sensitive(true)
            .invert_match(true)
            .before_context(1)
            .after_context(3)
            .seek_start(7);
        assert_eq!(options.pattern, "fail");
        assert!(options.case_sensitive);
        assert!(options.invert_match);
        assert!(!options.reverse);
        assert_eq!(options.seek_start, Some(7));
        assert_eq!(options.context_window(), (1, 3));
    }

    #[test]
    fn test_context_overrides_sides() {
        let options = SearchOptions::new("x").before_context(1).after_context(3).context(0);
        assert_eq!(options.context_window(), (0, 0));
    }
}
