use crate::record::RowRecord;
use crate::search::SearchResult;
use std::collections::VecDeque;

/// Context state machine shared by both search directions
///
/// Every record is classified by the caller. Non-matches feed the pending
/// result's after-list and the bounded before-ring; a match first releases any
/// pending result with whatever after-context it gathered, then takes the ring
/// as its before-context and clears it.
#[derive(Debug)]
pub(crate) struct ContextCollector {
    before_context: usize,
    after_context: usize,
    before: VecDeque<RowRecord>,
    pending: Option<SearchResult>,
}

impl ContextCollector {
    pub(crate) fn new(before_context: usize, after_context: usize) -> Self {
        Self {
            before_context,
            after_context,
            before: VecDeque::with_capacity(before_context),
            pending: None,
        }
    }

    /// Feed the next record in walk order, returning a completed result if any
    pub(crate) fn push(&mut self, record: RowRecord, matched: bool) -> Option<SearchResult> {
        if matched {
            let result = SearchResult {
                matched: record,
                before: self.before.drain(..).collect(),
                after: Vec::with_capacity(self.after_context),
            };
            if self.after_context == 0 {
                return Some(result);
            }
            return self.pending.replace(result);
        }

        match self.pending.as_mut() {
            Some(pending) => {
                if self.before_context > 0 {
                    remember(&mut self.before, self.before_context, record.clone());
                }
                pending.after.push(record);
                if pending.after.len() >= self.after_context {
                    return self.pending.take();
                }
            }
            None => remember(&mut self.before, self.before_context, record),
        }
        None
    }

    /// End of input: release the pending result, short after-context and all
    pub(crate) fn finish(&mut self) -> Option<SearchResult> {
        self.pending.take()
    }
}

fn remember(ring: &mut VecDeque<RowRecord>, capacity: usize, record: RowRecord) {
    if capacity == 0 {
        return;
    }
    if ring.len() == capacity {
        ring.pop_front();
    }
    ring.push_back(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StoredRecord;

    fn row(n: u64) -> RowRecord {
        RowRecord::new(
            n,
            StoredRecord {
                content: format!("row {n}"),
                ..StoredRecord::default()
            },
        )
    }

    fn rows(results: &[SearchResult]) -> Vec<(u64, Vec<u64>, Vec<u64>)> {
        results
            .iter()
            .map(|result| {
                (
                    result.row(),
                    result.before.iter().map(|r| r.row).collect(),
                    result.after.iter().map(|r| r.row).collect(),
                )
            })
            .collect()
    }

    fn run(before: usize, after: usize, matches: &[bool]) -> Vec<SearchResult> {
        let mut collector = ContextCollector::new(before, after);
        let mut out = Vec::new();
        for (n, &matched) in matches.iter().enumerate() {
            out.extend(collector.push(row(n as u64), matched));
        }
        out.extend(collector.finish());
        out
    }

    #[test]
    fn test_no_context() {
        let results = run(0, 0, &[false, true, false, true]);
        assert_eq!(rows(&results), vec![(1, vec![], vec![]), (3, vec![], vec![])]);
    }

    #[test]
    fn test_before_ring_evicts_oldest() {
        let results = run(2, 0, &[false, false, false, true]);
        assert_eq!(rows(&results), vec![(3, vec![1, 2], vec![])]);
    }

    #[test]
    fn test_after_context_completes() {
        let results = run(0, 2, &[true, false, false, false]);
        assert_eq!(rows(&results), vec![(0, vec![], vec![1, 2])]);
    }

    #[test]
    fn test_adjacent_matches_cut_after_context() {
        let results = run(1, 2, &[true, false, true, false]);
        assert_eq!(
            rows(&results),
            vec![(0, vec![], vec![1]), (2, vec![1], vec![3])]
        );
    }

    #[test]
    fn test_before_cleared_after_match() {
        let results = run(3, 0, &[false, true, true]);
        assert_eq!(rows(&results), vec![(1, vec![0], vec![]), (2, vec![], vec![])]);
    }

    #[test]
    fn test_pending_flushed_at_end() {
        let results = run(0, 5, &[false, true, false]);
        assert_eq!(rows(&results), vec![(1, vec![], vec![2])]);
    }
}
