use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use bklog::ingest::ingest_reader;
use bklog::record::NO_GROUP;
use bklog::search::SearchResult;
use bklog::store::RecordStream;
use bklog::{
    BklogError, ColumnarStore, ColumnarWriter, IngestConfig, LogReader, MemoryStore, RecordFlags,
    RecordStore, RecordWriter, SearchOptions, StoreConfig, StoredRecord,
};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

const SCENARIO: &str = "\x1b_bk;t=1\x07~~~ setup\n\
                        \x1b_bk;t=2\x07ok\n\
                        \x1b_bk;t=3\x07--- run\n\
                        \x1b_bk;t=4\x07done\n";

fn ingest_to_file(dir: &TempDir, name: &str, input: &str, config: &StoreConfig) -> PathBuf {
    let path = dir.path().join(name);
    let mut writer = ColumnarWriter::create(&path, config).expect("create writer");
    ingest_reader(Cursor::new(input), &mut writer, &IngestConfig::default()).expect("ingest");
    path
}

fn contents(stream: RecordStream) -> Vec<String> {
    stream
        .map(|row| row.expect("row").record.content)
        .collect()
}

fn synthetic_records(count: usize, seed: u64) -> Vec<StoredRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut group = String::new();
    (0..count)
        .map(|i| {
            let header = rng.gen_ratio(1, 20);
            let timed = rng.gen_ratio(9, 10);
            let content = if header {
                group = format!("~~~ step {i}");
                group.clone()
            } else {
                format!("\x1b[3{}mline {i}\x1b[0m value={}", i % 8, rng.gen::<u32>())
            };
            let mut flags = RecordFlags::empty();
            if timed {
                flags.insert(RecordFlags::HAS_TIMESTAMP);
            }
            if header {
                flags.insert(RecordFlags::IS_GROUP_HEADER);
            }
            StoredRecord {
                timestamp_ms: if timed { 1_745_322_209_921 + i as i64 } else { 0 },
                content,
                group: group.clone(),
                flags,
            }
        })
        .collect()
}

#[test]
fn scenario_groups_tail_and_search() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default();
    let path = ingest_to_file(&dir, "scenario.bklc", SCENARIO, &config);
    let reader = LogReader::open(&path, &config).expect("open reader");

    let groups = reader.groups().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].name, "~~~ setup");
    assert_eq!(groups[0].entry_count, 2);
    assert_eq!(groups[1].name, "--- run");
    assert_eq!(groups[1].entry_count, 2);

    assert_eq!(contents(reader.tail(1).unwrap()), vec!["done"]);

    let results: Vec<SearchResult> = reader
        .search(&SearchOptions::new("ok"))
        .unwrap()
        .collect::<bklog::Result<_>>()
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].matched.record.group, "~~~ setup");
    assert_eq!(results[0].row(), 1);
}

#[test]
fn columnar_round_trip_is_field_for_field() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default();
    let path = dir.path().join("round_trip.bklc");
    let records = synthetic_records(2_500, 7);

    let mut writer = ColumnarWriter::create(&path, &config).unwrap();
    for chunk in records.chunks(700) {
        writer.write_batch(chunk).unwrap();
    }
    let summary = writer.finish().unwrap();
    assert_eq!(summary.rows, 2_500);
    assert_eq!(summary.batches, 4);

    let reader = LogReader::open(&path, &config).unwrap();
    let read: Vec<StoredRecord> = reader
        .entries()
        .unwrap()
        .map(|row| row.unwrap().record)
        .collect();
    assert_eq!(read, records);

    let info = reader.info().unwrap();
    assert_eq!(info.row_count, 2_500);
    assert_eq!(info.num_batches, 4);
}

#[test]
fn seek_past_end_fails() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default();
    let path = ingest_to_file(&dir, "seek.bklc", SCENARIO, &config);
    let reader = LogReader::open(&path, &config).unwrap();

    assert_eq!(contents(reader.seek(3).unwrap()), vec!["done"]);
    for row in [4, 5, 100] {
        match reader.seek(row) {
            Err(BklogError::RowOutOfRange { row: got, total_rows }) => {
                assert_eq!(got, row);
                assert_eq!(total_rows, 4);
            }
            Err(other) => panic!("expected RowOutOfRange, got {other:?}"),
            Ok(_) => panic!("seek({row}) should fail"),
        }
    }
}

#[test]
fn filter_by_group_on_file() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default();
    let input = format!("preamble\n{SCENARIO}");
    let path = ingest_to_file(&dir, "filter.bklc", &input, &config);
    let reader = LogReader::open(&path, &config).unwrap();

    assert_eq!(contents(reader.filter_by_group("RUN").unwrap()), vec!["--- run", "done"]);
    assert_eq!(contents(reader.filter_by_group(NO_GROUP).unwrap()), vec!["preamble"]);
}

#[test]
fn memory_mapped_store_reads_the_same_rows() {
    let dir = TempDir::new().unwrap();
    let small = StoreConfig::default();
    let mapped = StoreConfig {
        memory_threshold: 0,
        ..StoreConfig::default()
    };
    let path = ingest_to_file(&dir, "mapped.bklc", SCENARIO, &small);

    let in_memory = contents(LogReader::open(&path, &small).unwrap().entries().unwrap());
    let via_mmap = contents(LogReader::open(&path, &mapped).unwrap().entries().unwrap());
    assert_eq!(in_memory, via_mmap);
}

#[test]
fn concurrent_queries_on_one_file() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default();
    let path = dir.path().join("shared.bklc");
    let mut writer = ColumnarWriter::create(&path, &config).unwrap();
    writer.write_batch(&synthetic_records(3_000, 11)).unwrap();
    writer.finish().unwrap();

    let store = Arc::new(ColumnarStore::open(&path, &config).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let reader = LogReader::new(store);
                if worker % 2 == 0 {
                    reader.entries().unwrap().count()
                } else {
                    reader
                        .search(&SearchOptions::new("line"))
                        .unwrap()
                        .count()
                }
            })
        })
        .collect();

    for handle in handles {
        let seen = handle.join().expect("query thread panicked");
        assert!(seen > 0);
    }
    assert_eq!(store.row_count().unwrap(), 3_000);
}

#[test]
fn stopping_early_leaves_file_reusable() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default();
    let path = ingest_to_file(&dir, "early.bklc", SCENARIO, &config);
    let reader = LogReader::open(&path, &config).unwrap();

    for row in reader.entries().unwrap() {
        if row.unwrap().record.content == "ok" {
            break;
        }
    }
    let first_match = reader.search(&SearchOptions::new(".")).unwrap().next();
    assert!(first_match.is_some());
    assert_eq!(reader.entries().unwrap().count(), 4);
}

fn rows_of(results: &[SearchResult]) -> Vec<u64> {
    results.iter().map(SearchResult::row).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn search_properties(
        words in proptest::collection::vec(prop_oneof!["alpha", "beta", "gamma", "ALPHA beta"], 0..60),
        before in 0usize..4,
        after in 0usize..4,
        invert in any::<bool>(),
    ) {
        let store = MemoryStore::from_records(
            words
                .iter()
                .map(|word| StoredRecord { content: word.to_string(), ..StoredRecord::default() })
                .collect(),
        );
        let reader = LogReader::new(store);
        let options = SearchOptions::new("alpha")
            .before_context(before)
            .after_context(after)
            .invert_match(invert);

        let forward: Vec<SearchResult> = reader.search(&options).unwrap().collect::<bklog::Result<_>>().unwrap();
        let reverse: Vec<SearchResult> = reader
            .search(&options.clone().reverse(true))
            .unwrap()
            .collect::<bklog::Result<_>>()
            .unwrap();

        let expected: Vec<u64> = words
            .iter()
            .enumerate()
            .filter(|(_, word)| word.to_lowercase().contains("alpha") != invert)
            .map(|(row, _)| row as u64)
            .collect();
        prop_assert_eq!(rows_of(&forward), expected.clone());

        let mut reverse_rows = rows_of(&reverse);
        reverse_rows.reverse();
        prop_assert_eq!(reverse_rows, expected.clone());

        let mut previous: Option<u64> = None;
        for result in &forward {
            prop_assert!(result.before.len() <= before);
            prop_assert!(result.after.len() <= after);
            for context in result.before.iter().chain(result.after.iter()) {
                prop_assert!(!expected.contains(&context.row));
            }
            let since_previous = match previous {
                Some(row) => result.row() - row - 1,
                None => result.row(),
            };
            prop_assert_eq!(result.before.len() as u64, since_previous.min(before as u64));
            previous = Some(result.row());
        }

        for result in &reverse {
            for context in &result.before {
                prop_assert!(context.row > result.row());
            }
            for context in &result.after {
                prop_assert!(context.row < result.row());
            }
        }
    }
}
