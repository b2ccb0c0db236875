use crate::record::StoredRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Per-group statistics from one scan
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupInfo {
    /// Group name, `<no group>` for records outside any group
    pub name: String,
    pub entry_count: u64,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
}

impl GroupInfo {
    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.first_seen_ms)
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.last_seen_ms)
    }
}

/// Streaming fold of records into [`GroupInfo`]s
///
/// Feed it a full scan or stop early; [`GroupAggregator::finish`] reports
/// whatever was seen. Untimed records count with timestamp 0.
#[derive(Debug, Default)]
pub struct GroupAggregator {
    index: HashMap<String, usize>,
    groups: Vec<GroupInfo>,
    records: u64,
}

impl GroupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &StoredRecord) {
        self.records += 1;
        let name = record.display_group();
        let timestamp = record.timestamp_ms;

        match self.index.get(name) {
            Some(&slot) => {
                let info = &mut self.groups[slot];
                info.entry_count += 1;
                info.first_seen_ms = info.first_seen_ms.min(timestamp);
                info.last_seen_ms = info.last_seen_ms.max(timestamp);
            }
            None => {
                self.index.insert(name.to_string(), self.groups.len());
                self.groups.push(GroupInfo {
                    name: name.to_string(),
                    entry_count: 1,
                    first_seen_ms: timestamp,
                    last_seen_ms: timestamp,
                });
            }
        }
    }

    /// Records folded so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Groups ordered by first appearance time, ties in scan order
    pub fn finish(self) -> Vec<GroupInfo> {
        let mut groups = self.groups;
        groups.sort_by_key(|group| group.first_seen_ms);
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NO_GROUP;

    fn record(group: &str, timestamp_ms: i64) -> StoredRecord {
        StoredRecord {
            timestamp_ms,
            group: group.to_string(),
            ..StoredRecord::default()
        }
    }

    #[test]
    fn test_counts_and_bounds() {
        let mut aggregator = GroupAggregator::new();
        aggregator.add(&record("~~~ setup", 10));
        aggregator.add(&record("~~~ setup", 30));
        aggregator.add(&record("--- run", 40));
        aggregator.add(&record("~~~ setup", 20));

        assert_eq!(aggregator.records(), 4);
        let groups = aggregator.finish();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "~~~ setup");
        assert_eq!(groups[0].entry_count, 3);
        assert_eq!(groups[0].first_seen_ms, 10);
        assert_eq!(groups[0].last_seen_ms, 30);
        assert_eq!(groups[1].name, "--- run");
    }

    #[test]
    fn test_sorted_by_first_seen() {
        let mut aggregator = GroupAggregator::new();
        aggregator.add(&record("late", 500));
        aggregator.add(&record("early", 100));
        aggregator.add(&record("tie", 100));
        let names: Vec<String> = aggregator.finish().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["early", "tie", "late"]);
    }

    #[test]
    fn test_empty_group_uses_placeholder() {
        let mut aggregator = GroupAggregator::new();
        aggregator.add(&record("", 5));
        let groups = aggregator.finish();
        assert_eq!(groups[0].name, NO_GROUP);
        assert_eq!(groups[0].first_seen().map(|t| t.timestamp_millis()), Some(5));
    }
}
