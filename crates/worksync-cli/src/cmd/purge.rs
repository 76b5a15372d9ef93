//! Purge subcommand - re-run the author exclusion on an existing database

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use worksync_openalex::{ExclusionList, purge};
use worksync_store::DuckDbSink;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Author id to purge, in addition to `store.excluded_authors` (repeatable)
    #[arg(long = "exclude")]
    pub excluded: Vec<String>,

    /// DuckDB database file
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Table name
    #[arg(long)]
    pub table: Option<String>,
}

pub fn run(args: PurgeArgs, config: &Config) -> Result<ExitCode> {
    let mut store = config.store.store_config();
    if let Some(path) = args.database {
        store.database = Some(path);
    }
    if let Some(table) = args.table {
        store.table = table;
    }
    let Some(path) = store.database.clone() else {
        anyhow::bail!("no database configured (--database or store.database)");
    };

    let mut ids = config.store.excluded_authors.clone();
    ids.extend(args.excluded);
    let excluded = ExclusionList::new(&ids);
    if excluded.is_empty() {
        log::warn!("Exclusion list is empty, nothing to purge");
        return Ok(ExitCode::SUCCESS);
    }

    let sink = DuckDbSink::open(&store)
        .with_context(|| format!("opening {}", path.display()))?;
    let removed = purge(&sink, &excluded).context("purging excluded authors")?;
    eprintln!(
        "Purged {removed} rows for {} authors from {}",
        excluded.len(),
        sink.table()
    );
    Ok(ExitCode::SUCCESS)
}
