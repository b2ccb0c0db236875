//! Raw log to record store pipelines.
//!
//! The async path reads lines on the runtime and hands full batches over a
//! bounded channel to a blocking writer task, so encoding and compression
//! never stall the reader's executor thread. A writer only finishes after the
//! reader has drained its source without error; on failure the writer is
//! dropped unfinished and a columnar target is never created.

use crate::config::{Config, IngestConfig};
use crate::error::{BklogError, Result};
use crate::ingest::batcher::{IngestSummary, LineBatcher};
use crate::ingest::compression::{detect_compression, open_log_source};
use crate::parser::LineSplitter;
use crate::record::StoredRecord;
use crate::store::{validate_file_path, ColumnarWriter, RecordWriter, WriteSummary};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Ingest every line of `reader` into `writer` on the current thread
pub fn ingest_reader<R, W>(mut reader: R, writer: &mut W, config: &IngestConfig) -> Result<IngestSummary>
where
    R: BufRead,
    W: RecordWriter + ?Sized,
{
    let mut batcher = LineBatcher::new(config);
    let mut lines = LineSplitter::new(config.max_line_bytes);
    while let Some(line) = lines.read_line(&mut reader)? {
        if let Some(batch) = batcher.push_line(line) {
            writer.write_batch(&batch)?;
        }
    }
    if let Some(batch) = batcher.flush() {
        writer.write_batch(&batch)?;
    }

    let write = writer.finish()?;
    Ok(batcher.into_summary(write))
}

/// Ingest a possibly compressed log file into `writer`
pub async fn ingest_file<W>(path: impl AsRef<Path>, writer: W, config: &IngestConfig) -> Result<IngestSummary>
where
    W: RecordWriter + 'static,
{
    run(path.as_ref(), writer, config, LineBatcher::new(config)).await
}

/// Like [`ingest_file`], keeping only records accepted by `filter`
pub async fn ingest_file_filtered<W, F>(
    path: impl AsRef<Path>,
    writer: W,
    config: &IngestConfig,
    filter: F,
) -> Result<IngestSummary>
where
    W: RecordWriter + 'static,
    F: Fn(&StoredRecord) -> bool + Send + 'static,
{
    let batcher = LineBatcher::new(config).with_filter(filter);
    run(path.as_ref(), writer, config, batcher).await
}

/// Ingest `source` into a new columnar file at `target`
pub async fn ingest_to_columnar(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    config: &Config,
) -> Result<IngestSummary> {
    config.validate()?;
    let writer = ColumnarWriter::create(target, &config.store)?;
    ingest_file(source, writer, &config.ingest).await
}

/// One source file and the writer receiving its records
pub struct IngestJob<W> {
    pub path: PathBuf,
    pub writer: W,
}

impl<W> IngestJob<W> {
    pub fn new(path: impl Into<PathBuf>, writer: W) -> Self {
        Self {
            path: path.into(),
            writer,
        }
    }
}

/// Ingest several files concurrently, each with its own group state
///
/// Summaries come back in job order. The first failure is returned; writers
/// of jobs that did not finish are dropped unfinished.
pub async fn ingest_many<W>(jobs: Vec<IngestJob<W>>, config: &IngestConfig) -> Result<Vec<IngestSummary>>
where
    W: RecordWriter + 'static,
{
    let runs = jobs
        .into_iter()
        .map(|job| async move { ingest_file(&job.path, job.writer, config).await });
    futures::future::try_join_all(runs).await
}

enum WriterMessage {
    Batch(Vec<StoredRecord>),
    Finish,
}

async fn run<W>(path: &Path, mut writer: W, config: &IngestConfig, mut batcher: LineBatcher) -> Result<IngestSummary>
where
    W: RecordWriter + 'static,
{
    validate_file_path(path)?;
    let compression = detect_compression(path).await?;
    log::info!(
        "Ingesting {} (compression: {})",
        path.display(),
        compression.name()
    );
    let mut source = open_log_source(path, compression).await?;
    let read_error = |e: BklogError| match e {
        BklogError::FileError { source: cause, .. } if compression.is_compressed() => BklogError::compression(
            format!("Failed to decompress {} ({}): {cause}", path.display(), compression.name()),
        ),
        other => other,
    };

    let (tx, mut rx) = mpsc::channel::<WriterMessage>(config.channel_capacity.max(1));
    let writer_task = tokio::task::spawn_blocking(move || -> Result<WriteSummary> {
        while let Some(message) = rx.blocking_recv() {
            match message {
                WriterMessage::Batch(batch) => writer.write_batch(&batch)?,
                WriterMessage::Finish => return writer.finish(),
            }
        }
        Err(BklogError::other("ingestion aborted before the writer finished"))
    });

    let read_result: Result<()> = async {
        let mut lines = LineSplitter::new(config.max_line_bytes);
        while let Some(line) = lines.read_line_async(&mut source).await.map_err(read_error)? {
            if let Some(batch) = batcher.push_line(line) {
                if tx.send(WriterMessage::Batch(batch)).await.is_err() {
                    // Writer gave up; its error is reported below
                    return Ok(());
                }
            }
        }
        if let Some(batch) = batcher.flush() {
            if tx.send(WriterMessage::Batch(batch)).await.is_err() {
                return Ok(());
            }
        }
        let _ = tx.send(WriterMessage::Finish).await;
        Ok(())
    }
    .await;
    drop(tx);

    let written = writer_task
        .await
        .map_err(|e| BklogError::other(format!("writer task failed: {e}")))?;
    read_result?;
    let summary = batcher.into_summary(written?);

    log::info!(
        "Ingested {}: {} lines, {} records, {} groups",
        path.display(),
        summary.lines,
        summary.records,
        summary.group_headers
    );
    Ok(summary)
}
