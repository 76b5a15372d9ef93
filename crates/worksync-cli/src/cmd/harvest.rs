//! Harvest subcommand - fetch, flatten, load, purge

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;
use rustc_hash::FxHashMap;
use worksync_core::{CancelToken, ProgressContext, SharedProgress};
use worksync_openalex::{
    Cursor, ExclusionList, FetchConfig, Harvest, HarvestRequest, HttpTransport, LoadReport,
    MemorySink, QueryDescriptor, RecordSink, RunSummary, build_shards, fetch_and_structure, load,
    write_snapshot,
};
use worksync_store::DuckDbSink;

use super::parse_date;
use crate::config::Config;

/// Query selection shared by `harvest` and `url`
#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Institution ROR id (e.g. 02wb73912)
    #[arg(long)]
    pub institution: Option<String>,

    /// Author id to harvest regardless of affiliation (repeatable)
    #[arg(long = "author")]
    pub authors: Vec<String>,

    /// Earliest publication date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Latest publication date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Contact address for the OpenAlex polite pool
    #[arg(long)]
    pub mailto: Option<String>,
}

impl QueryArgs {
    /// Merge with the config file; flags win, author lists are combined
    pub fn request(&self, config: &Config) -> HarvestRequest {
        let oa = &config.openalex;
        let mut author_ids = oa.author_ids.clone();
        author_ids.extend(self.authors.iter().cloned());
        HarvestRequest {
            endpoint: oa.endpoint.clone(),
            institution_ror: self.institution.clone().or_else(|| oa.institution_ror.clone()),
            author_ids,
            from_date: self.from.or(oa.from_date),
            to_date: self.to.or(oa.to_date),
            mailto: self.mailto.clone().or_else(|| oa.mailto.clone()),
            per_page: oa.per_page,
            chunk_size: oa.chunk_size,
            ..HarvestRequest::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct HarvestArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Author id whose rows are purged after loading (repeatable)
    #[arg(long = "exclude")]
    pub excluded: Vec<String>,

    /// DuckDB database file
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Table name
    #[arg(long)]
    pub table: Option<String>,

    /// Load into memory only; the database is not touched
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the flat records to DIR/works_flat.parquet
    #[arg(long, value_name = "DIR")]
    pub snapshot: Option<PathBuf>,

    /// Zstd compression level for the snapshot (1-22)
    #[arg(long, default_value_t = 3)]
    pub zstd_level: i32,

    /// Shards fetched in parallel
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Restart a shard at a cursor: LABEL=CURSOR, or CURSOR alone for a single shard (repeatable)
    #[arg(long = "resume-cursor", value_name = "CURSOR")]
    pub resume: Vec<String>,
}

pub fn run(args: HarvestArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let request = args.query.request(config);
    if request.is_empty() {
        bail!("nothing to harvest: set an institution (--institution) or authors (--author)");
    }
    let shards = build_shards(&request);
    let resume = parse_resume(&args.resume, &shards)?;

    let fetch = FetchConfig {
        retry: config.http.retry_policy()?,
        workers: args.workers.unwrap_or(config.http.workers),
        http: config.http.http_config(),
    };
    let mut excluded_ids = config.store.excluded_authors.clone();
    excluded_ids.extend(args.excluded.iter().cloned());
    let excluded = ExclusionList::new(&excluded_ids);

    // Open the store before fetching so a bad path fails fast
    let sink: Box<dyn RecordSink> = if args.dry_run {
        log::info!("Dry run: loading into memory");
        Box::new(MemorySink::new())
    } else {
        let mut store = config.store.store_config();
        if let Some(path) = args.database {
            store.database = Some(path);
        }
        if let Some(table) = args.table {
            store.table = table;
        }
        if store.database.is_none() {
            log::warn!("No database configured; rows are kept in memory only");
        }
        Box::new(DuckDbSink::open(&store).context("opening store")?)
    };

    let start = Instant::now();
    let transport = HttpTransport::new(&fetch.http).context("building HTTP client")?;
    let cancel = CancelToken::global();
    let harvest = fetch_and_structure(&shards, &transport, &fetch, cancel, &resume, progress);

    if let Some(dir) = &args.snapshot {
        let records: Vec<_> = harvest.records().cloned().collect();
        write_snapshot(&records, dir, args.zstd_level)?;
    }

    // Partial shards are loaded too; a resumed run fills in the rest
    let report: LoadReport = load(&harvest, sink.as_ref(), &excluded).context("loading records")?;

    let summary = RunSummary::new(&harvest, Some(&report), start.elapsed());
    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }
    Ok(finish(&harvest, progress))
}

/// `--resume-cursor` values that restart every failed shard where it stopped
fn resume_hints(harvest: &Harvest) -> Vec<String> {
    harvest
        .shards
        .iter()
        .filter_map(|shard| {
            let err = shard.error.as_ref()?;
            Some(format!("--resume-cursor {}={}", shard.label, err.cursor()))
        })
        .collect()
}

/// Exit code for a finished harvest, printing how to resume failed shards
fn finish(harvest: &Harvest, progress: &ProgressContext) -> ExitCode {
    for shard in &harvest.shards {
        if let Some(err) = &shard.error {
            log::error!("{}: {err}", shard.label);
        }
    }
    for hint in resume_hints(harvest) {
        progress.println(format!("resume with: {hint}"));
    }
    if harvest.was_cancelled() {
        log::warn!("Harvest cancelled");
        ExitCode::from(130)
    } else if !harvest.is_complete() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Parse `--resume-cursor` values into a label → cursor map.
///
/// OpenAlex cursors may end in `=`, so a value only counts as `LABEL=CURSOR`
/// when the part before the first `=` names a shard.
fn parse_resume(values: &[String], shards: &[QueryDescriptor]) -> Result<FxHashMap<String, Cursor>> {
    let mut resume = FxHashMap::default();
    for value in values {
        let labelled = value
            .split_once('=')
            .filter(|(label, _)| shards.iter().any(|s| s.label() == *label));
        let (label, cursor) = match labelled {
            Some((label, cursor)) => (label.to_string(), cursor),
            None if shards.len() == 1 => (shards[0].label().to_string(), value.as_str()),
            None => bail!(
                "--resume-cursor {value:?} needs a shard label (one of: {})",
                shards.iter().map(|s| s.label()).collect::<Vec<_>>().join(", ")
            ),
        };
        if cursor.is_empty() {
            bail!("--resume-cursor for {label} has an empty cursor");
        }
        resume.insert(label, Cursor::new(cursor));
    }
    Ok(resume)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards(authors: usize) -> Vec<QueryDescriptor> {
        build_shards(&HarvestRequest {
            institution_ror: Some("02wb73912".into()),
            author_ids: (0..authors).map(|i| format!("A{i}")).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn resume_with_label() {
        let shards = shards(40);
        let values = vec!["authors-02=IlsxNjA5XSI=".to_string()];
        let resume = parse_resume(&values, &shards).unwrap();
        assert_eq!(resume.len(), 1);
        assert_eq!(resume["authors-02"].as_str(), "IlsxNjA5XSI=");
    }

    #[test]
    fn bare_cursor_for_single_shard() {
        let shards = shards(0);
        let values = vec!["IlsxNjA5XSI=".to_string()];
        let resume = parse_resume(&values, &shards).unwrap();
        assert_eq!(resume["institution"].as_str(), "IlsxNjA5XSI=");
    }

    #[test]
    fn bare_cursor_ambiguous_with_many_shards() {
        let shards = shards(5);
        let values = vec!["abc".to_string()];
        assert!(parse_resume(&values, &shards).is_err());
    }

    #[test]
    fn empty_cursor_rejected() {
        let shards = shards(5);
        let values = vec!["institution=".to_string()];
        assert!(parse_resume(&values, &shards).is_err());
    }

    #[test]
    fn resume_hints_name_failed_shards() {
        use std::time::Duration;
        use worksync_openalex::{FetchError, Position, ShardResult};

        let shard = |label: &str, error: Option<FetchError>| ShardResult {
            label: label.to_string(),
            pages: 0,
            works: 0,
            total_reported: None,
            records: Vec::new(),
            elapsed: Duration::ZERO,
            error,
        };
        let cancelled = FetchError::Cancelled {
            position: Position {
                query: "authors-02".to_string(),
                cursor: Cursor::new("IlsxNjA5XSI="),
                pages: 3,
                items_processed: 600,
                total_reported: Some(900),
            },
        };
        let harvest = Harvest {
            shards: vec![shard("institution", None), shard("authors-02", Some(cancelled))],
        };
        assert_eq!(
            resume_hints(&harvest),
            vec!["--resume-cursor authors-02=IlsxNjA5XSI=".to_string()]
        );
        assert!(resume_hints(&Harvest::default()).is_empty());
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.openalex.institution_ror = Some("from-config".into());
        config.openalex.author_ids = vec!["A1".into()];
        config.openalex.from_date = NaiveDate::from_ymd_opt(2020, 1, 1);

        let args = QueryArgs {
            institution: Some("02wb73912".into()),
            authors: vec!["A2".into()],
            ..Default::default()
        };
        let request = args.request(&config);
        assert_eq!(request.institution_ror.as_deref(), Some("02wb73912"));
        assert_eq!(request.author_ids, vec!["A1", "A2"]);
        assert_eq!(request.from_date, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert!(request.to_date.is_none());
    }
}
