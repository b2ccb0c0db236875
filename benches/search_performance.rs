use bklog::ingest::ingest_to_columnar;
use bklog::{Config, LogReader, SearchOptions};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tokio::runtime::Runtime;

fn create_build_log(lines: usize, pattern_frequency: usize) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let steps = ["setup", "checkout", "build", "test", "upload"];
    let errors = ["timeout", "connection_failed", "assertion failed", "out_of_memory"];
    let mut timestamp: i64 = 1_745_322_209_921;

    for line_num in 0..lines {
        timestamp += rng.gen_range(0..50);
        let line = if line_num % 500 == 0 {
            let step = steps[(line_num / 500) % steps.len()];
            format!("\x1b_bk;t={timestamp}\x07~~~ :pipeline: Running {step}\n")
        } else if line_num % pattern_frequency == 0 {
            let error = errors[(line_num / pattern_frequency) % errors.len()];
            format!("\x1b_bk;t={timestamp}\x07\x1b[31mERROR\x1b[0m job {line_num} failed with {error}\n")
        } else {
            format!(
                "\x1b_bk;t={timestamp}\x07\x1b[90m[{}]\x1b[0m compiled module_{} in {}ms\n",
                line_num,
                rng.gen_range(0..1000),
                rng.gen_range(1..500)
            )
        };
        temp_file.write_all(line.as_bytes()).unwrap();
    }

    temp_file.flush().unwrap();
    temp_file
}

fn build_store(rt: &Runtime, dir: &TempDir, lines: usize, pattern_frequency: usize) -> std::path::PathBuf {
    let source = create_build_log(lines, pattern_frequency);
    let target = dir.path().join(format!("bench_{lines}.bklc"));
    rt.block_on(ingest_to_columnar(source.path(), &target, &Config::default()))
        .expect("ingest benchmark log");
    target
}

fn bench_search_patterns(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let mut group = c.benchmark_group("search_patterns");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    for &lines in &[10_000usize, 100_000, 500_000] {
        let path = build_store(&rt, &dir, lines, 100);
        let reader = LogReader::open(&path, &config.store).unwrap();

        group.bench_with_input(BenchmarkId::new("literal", lines), &reader, |b, reader| {
            let options = SearchOptions::new("timeout");
            b.iter(|| black_box(reader.search(&options).unwrap().count()));
        });

        group.bench_with_input(BenchmarkId::new("regex", lines), &reader, |b, reader| {
            let options = SearchOptions::new(r"module_\d{3} in \d+ms");
            b.iter(|| black_box(reader.search(&options).unwrap().count()));
        });

        group.bench_with_input(BenchmarkId::new("case_sensitive", lines), &reader, |b, reader| {
            let options = SearchOptions::new("ERROR").case_sensitive(true);
            b.iter(|| black_box(reader.search(&options).unwrap().count()));
        });

        group.bench_with_input(BenchmarkId::new("with_context", lines), &reader, |b, reader| {
            let options = SearchOptions::new("connection_failed").context(3);
            b.iter(|| black_box(reader.search(&options).unwrap().count()));
        });

        group.bench_with_input(BenchmarkId::new("reverse", lines), &reader, |b, reader| {
            let options = SearchOptions::new("timeout").reverse(true);
            b.iter(|| black_box(reader.search(&options).unwrap().count()));
        });
    }

    group.finish();
}

fn bench_navigation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let mut group = c.benchmark_group("navigation");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(2));

    let path = build_store(&rt, &dir, 200_000, 50);
    let reader = LogReader::open(&path, &config.store).unwrap();

    group.bench_function("first_match", |b| {
        let options = SearchOptions::new("out_of_memory");
        b.iter(|| black_box(reader.search(&options).unwrap().next()));
    });

    group.bench_function("seek_middle", |b| {
        b.iter(|| black_box(reader.seek(100_000).unwrap().take(100).count()));
    });

    group.bench_function("tail_100", |b| {
        b.iter(|| black_box(reader.tail(100).unwrap().count()));
    });

    group.bench_function("groups", |b| {
        b.iter(|| black_box(reader.groups().unwrap().len()));
    });

    group.finish();
}

criterion_group!(benches, bench_search_patterns, bench_navigation);
criterion_main!(benches);
