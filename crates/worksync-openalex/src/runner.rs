//! Harvest orchestration: shards → cursor chains → flat records → sink

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use rustc_hash::FxHashMap;
use worksync_core::{CancelToken, ParquetSink, ProgressContext, WorkQueue, drain_rows, fmt_num};

use crate::config::{FetchConfig, HarvestRequest};
use crate::cursor::Cursor;
use crate::error::{FetchError, SinkError};
use crate::fetcher::{PageFetcher, Transport};
use crate::query::{QueryBuilder, QueryDescriptor, chunk_author_ids};
use crate::schema;
use crate::sink::{ExclusionList, LoadReport, RecordSink};
use crate::transform::{FlatRecord, FlatRecordAccumulator, flatten_works};

/// Snapshot file name (without extension)
pub const SNAPSHOT_NAME: &str = "works_flat";

/// Split a request into independent queries.
///
/// The institution query comes first, then one query per author chunk.
/// Date filters apply to every shard.
pub fn build_shards(request: &HarvestRequest) -> Vec<QueryDescriptor> {
    let base = || {
        let mut b = QueryBuilder::new(request.endpoint.clone())
            .per_page(request.per_page)
            .select(&request.select);
        if let Some(email) = &request.mailto {
            b = b.mailto(email.clone());
        }
        if let Some(d) = request.from_date {
            b = b.from_date(d);
        }
        if let Some(d) = request.to_date {
            b = b.to_date(d);
        }
        b
    };

    let mut shards = Vec::new();
    if let Some(ror) = &request.institution_ror {
        shards.push(base().institution(ror.clone()).label("institution").build());
    }
    let chunks = chunk_author_ids(&request.author_ids, request.chunk_size);
    for (i, chunk) in chunks.iter().enumerate() {
        shards.push(
            base()
                .authors(chunk)
                .label(format!("authors-{:02}", i + 1))
                .build(),
        );
    }
    shards
}

/// Outcome of one cursor chain
#[derive(Debug)]
pub struct ShardResult {
    pub label: String,
    pub pages: usize,
    pub works: usize,
    pub total_reported: Option<u64>,
    /// Rows from every page fetched, including pages before a failure
    pub records: Vec<FlatRecord>,
    pub elapsed: Duration,
    pub error: Option<FetchError>,
}

impl ShardResult {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// All shard results, in shard order
#[derive(Debug, Default)]
pub struct Harvest {
    pub shards: Vec<ShardResult>,
}

impl Harvest {
    /// Records of every shard, concatenated in shard order
    pub fn records(&self) -> impl Iterator<Item = &FlatRecord> {
        self.shards.iter().flat_map(|s| &s.records)
    }

    pub fn record_count(&self) -> usize {
        self.shards.iter().map(|s| s.records.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FetchError> {
        self.shards.iter().filter_map(|s| s.error.as_ref())
    }

    /// Error of the first failed shard in shard order
    pub fn first_error(&self) -> Option<&FetchError> {
        self.failures().next()
    }

    pub fn is_complete(&self) -> bool {
        self.shards.iter().all(ShardResult::is_complete)
    }

    pub fn was_cancelled(&self) -> bool {
        self.failures().any(FetchError::is_cancelled)
    }
}

fn run_shard<T: Transport + ?Sized>(
    query: &QueryDescriptor,
    transport: &T,
    config: &FetchConfig,
    cancel: &CancelToken,
    resume: Option<&Cursor>,
    progress: &ProgressContext,
) -> ShardResult {
    let start = Instant::now();
    let mut fetcher = PageFetcher::new(query, transport, config.retry, cancel.clone())
        .with_progress(progress.chain_bar(query.label()));
    if let Some(cursor) = resume {
        log::info!("{}: resuming at cursor {cursor}", query.label());
        fetcher = fetcher.resume_from(cursor.clone());
    }

    let mut records = Vec::new();
    let mut error = None;
    for page in fetcher.by_ref() {
        match page {
            Ok(page) => records.extend(flatten_works(&page.results)),
            Err(e) => error = Some(e),
        }
    }

    ShardResult {
        label: query.label().to_string(),
        pages: fetcher.pages(),
        works: fetcher.items_processed(),
        total_reported: fetcher.total_reported(),
        records,
        elapsed: start.elapsed(),
        error,
    }
}

/// Fetch and flatten every shard on up to `config.workers` threads.
///
/// Each shard owns its cursor chain. `resume` maps shard labels to the
/// cursor to restart from. A failing shard does not stop the others;
/// cancellation stops all of them.
pub fn fetch_and_structure<T: Transport + ?Sized>(
    shards: &[QueryDescriptor],
    transport: &T,
    config: &FetchConfig,
    cancel: &CancelToken,
    resume: &FxHashMap<String, Cursor>,
    progress: &ProgressContext,
) -> Harvest {
    if shards.is_empty() {
        log::warn!("No shards to fetch");
        return Harvest::default();
    }
    let workers = config.workers.clamp(1, shards.len());
    log::info!("Fetching {} shards with {} workers", shards.len(), workers);

    let queue = WorkQueue::new(shards.iter().collect::<Vec<_>>());
    let slots: Mutex<Vec<Option<ShardResult>>> =
        Mutex::new((0..shards.len()).map(|_| None).collect());

    rayon::scope(|s| {
        for _ in 0..workers {
            s.spawn(|_| {
                while let Some((idx, query)) = queue.next() {
                    let resume_at = resume.get(query.label());
                    let result = run_shard(query, transport, config, cancel, resume_at, progress);
                    if let Ok(mut slots) = slots.lock() {
                        slots[idx] = Some(result);
                    }
                }
            });
        }
    });

    let shards = slots
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .into_iter()
        .flatten()
        .collect();
    Harvest { shards }
}

/// Upsert every harvested record, then purge excluded authors.
///
/// Record-level failures are collected in the report; a failing purge is an error.
pub fn load(
    harvest: &Harvest,
    sink: &dyn RecordSink,
    excluded: &ExclusionList,
) -> Result<LoadReport, SinkError> {
    let records: Vec<FlatRecord> = harvest.records().cloned().collect();
    let mut report = sink.upsert_all(&records);
    log::info!(
        "Loaded {} records: {} inserted, {} already present, {} rejected",
        fmt_num(report.attempted()),
        fmt_num(report.inserted),
        fmt_num(report.skipped),
        fmt_num(report.failures.len())
    );
    report.purged = purge(sink, excluded)?;
    Ok(report)
}

/// Delete excluded authors' rows; returns rows removed
pub fn purge(sink: &dyn RecordSink, excluded: &ExclusionList) -> Result<usize, SinkError> {
    if excluded.is_empty() {
        return Ok(0);
    }
    let purged = sink.delete_authors(excluded)?;
    log::info!(
        "Purged {} rows for {} excluded authors",
        fmt_num(purged),
        excluded.len()
    );
    Ok(purged)
}

/// Write records to `{dir}/works_flat.parquet` (tmp file renamed on success)
pub fn write_snapshot(
    records: &[FlatRecord],
    dir: &Path,
    zstd_level: i32,
) -> anyhow::Result<(PathBuf, usize)> {
    let mut sink = ParquetSink::new(SNAPSHOT_NAME, dir, schema::flat_records(), zstd_level)
        .with_context(|| format!("creating snapshot in {}", dir.display()))?;
    let mut acc = FlatRecordAccumulator::new();
    drain_rows(&mut acc, records.iter().cloned(), |batch| sink.write_batch(batch))
        .context("writing snapshot batches")?;
    let (path, rows) = sink.finalize().context("finalizing snapshot")?;
    log::info!("Snapshot: {} rows → {}", fmt_num(rows), path.display());
    Ok((path, rows))
}

/// Summary of a harvest run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total_shards: usize,
    pub completed_shards: usize,
    pub failed_shards: usize,
    pub pages: usize,
    pub works: usize,
    pub records: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub purged: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(harvest: &Harvest, report: Option<&LoadReport>, elapsed: Duration) -> Self {
        let completed = harvest.shards.iter().filter(|s| s.is_complete()).count();
        let mut summary = Self {
            total_shards: harvest.shards.len(),
            completed_shards: completed,
            failed_shards: harvest.shards.len() - completed,
            pages: harvest.shards.iter().map(|s| s.pages).sum(),
            works: harvest.shards.iter().map(|s| s.works).sum(),
            records: harvest.record_count(),
            elapsed,
            ..Default::default()
        };
        if let Some(report) = report {
            summary.inserted = report.inserted;
            summary.skipped = report.skipped;
            summary.rejected = report.failures.len();
            summary.purged = report.purged;
        }
        summary
    }

    /// Log summary for non-TTY output
    pub fn log(&self) {
        log::info!("=== Harvest Summary ===");
        log::info!(
            "Shards: {}/{} completed ({} failed)",
            self.completed_shards,
            self.total_shards,
            self.failed_shards
        );
        log::info!(
            "Fetched: {} works in {} pages → {} records",
            fmt_num(self.works),
            fmt_num(self.pages),
            fmt_num(self.records)
        );
        log::info!(
            "Stored: {} inserted, {} skipped, {} rejected, {} purged",
            fmt_num(self.inserted),
            fmt_num(self.skipped),
            fmt_num(self.rejected),
            fmt_num(self.purged)
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }

    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Harvest")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        let shard_color = if self.failed_shards > 0 {
            Color::Red
        } else {
            Color::Green
        };
        table.add_row(vec![
            Cell::new("Shards"),
            Cell::new(format!(
                "{}/{} ({} failed)",
                self.completed_shards, self.total_shards, self.failed_shards
            ))
            .fg(shard_color),
        ]);
        table.add_row(vec![Cell::new("Pages"), Cell::new(fmt_num(self.pages))]);
        table.add_row(vec![Cell::new("Works"), Cell::new(fmt_num(self.works))]);
        table.add_row(vec![
            Cell::new("Records"),
            Cell::new(fmt_num(self.records)),
        ]);
        table.add_row(vec![
            Cell::new("Inserted").fg(Color::Green),
            Cell::new(fmt_num(self.inserted)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Already present"),
            Cell::new(fmt_num(self.skipped)),
        ]);
        if self.rejected > 0 {
            table.add_row(vec![
                Cell::new("Rejected").fg(Color::Red),
                Cell::new(fmt_num(self.rejected)).fg(Color::Red),
            ]);
        }
        table.add_row(vec![
            Cell::new("Purged"),
            Cell::new(fmt_num(self.purged)),
        ]);
        table.add_row(vec![
            Cell::new("Time"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);
        table.to_string()
    }

    pub fn print(&self) {
        println!("{}", self.format_table());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request() -> HarvestRequest {
        HarvestRequest {
            institution_ror: Some("02wb73912".into()),
            author_ids: (0..45).map(|i| format!("A{i}")).collect(),
            from_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            to_date: NaiveDate::from_ymd_opt(2023, 12, 31),
            mailto: Some("me@example.org".into()),
            ..Default::default()
        }
    }

    #[test]
    fn shards_institution_then_author_chunks() {
        let shards = build_shards(&request());
        assert_eq!(shards.len(), 3);
        assert_eq!(shards[0].label(), "institution");
        assert_eq!(shards[1].label(), "authors-01");
        assert_eq!(shards[2].label(), "authors-02");
        for s in &shards {
            assert!(s.base_url().contains("from_publication_date:2023-01-01"));
            assert!(s.base_url().contains("to_publication_date:2023-12-31"));
            assert_eq!(s.mailto(), Some("me@example.org"));
        }
        assert!(shards[2].base_url().contains("authorships.author.id:A30|"));
    }

    #[test]
    fn no_institution_no_authors_no_shards() {
        assert!(build_shards(&HarvestRequest::default()).is_empty());
    }

    #[test]
    fn empty_shard_list_gives_empty_harvest() {
        struct Never;
        impl Transport for Never {
            fn get(
                &self,
                _url: &str,
                _cancel: &CancelToken,
            ) -> Result<String, worksync_core::TransportError> {
                unreachable!("no shards, no requests")
            }
        }
        let harvest = fetch_and_structure(
            &[],
            &Never,
            &FetchConfig::default(),
            &CancelToken::new(),
            &FxHashMap::default(),
            &ProgressContext::hidden(),
        );
        assert!(harvest.shards.is_empty());
        assert!(harvest.is_complete());
    }

    #[test]
    fn summary_log_does_not_panic() {
        let summary = RunSummary {
            total_shards: 3,
            completed_shards: 2,
            failed_shards: 1,
            pages: 40,
            works: 7_900,
            records: 52_000,
            inserted: 50_000,
            skipped: 2_000,
            rejected: 0,
            purged: 12,
            elapsed: Duration::from_secs(90),
        };
        summary.log();
        let table = summary.format_table();
        assert!(table.contains("2/3 (1 failed)"));
        assert!(table.contains("52,000"));
        assert!(!table.contains("Rejected"));
    }

    #[test]
    fn summary_from_empty_harvest() {
        let summary = RunSummary::new(&Harvest::default(), None, Duration::ZERO);
        assert_eq!(summary.total_shards, 0);
        assert_eq!(summary.records, 0);
        summary.log();
    }
}
