//! Subcommands

pub mod harvest;
pub mod purge;
pub mod url;

use anyhow::Result;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

/// Print the effective configuration on stderr
pub fn print_config(config: &Config) -> Result<()> {
    let policy = config.http.retry_policy()?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let oa = &config.openalex;
    table.add_row(vec!["Endpoint", &oa.endpoint]);
    table.add_row(vec![
        "Mailto",
        if oa.mailto.is_some() { "configured" } else { "not set" },
    ]);
    table.add_row(vec![
        "Institution (ROR)",
        oa.institution_ror.as_deref().unwrap_or("-"),
    ]);
    table.add_row(vec!["Authors", &oa.author_ids.len().to_string()]);
    table.add_row(vec!["From", &fmt_date(oa.from_date)]);
    table.add_row(vec!["To", &fmt_date(oa.to_date)]);
    table.add_row(vec!["Per page", &oa.per_page.to_string()]);
    table.add_row(vec!["Authors per query", &oa.chunk_size.to_string()]);
    table.add_row(vec!["Workers", &config.http.workers.to_string()]);
    table.add_row(vec!["Max retries", &policy.max_retries.to_string()]);
    table.add_row(vec![
        "Cool-down",
        &format!("{}s ({:?})", policy.cooldown.as_secs(), policy.backoff),
    ]);
    table.add_row(vec![
        "Request timeout",
        &format!("{}s", config.http.request_timeout_secs),
    ]);
    let database = config
        .store
        .database
        .as_ref()
        .map_or_else(|| "(in memory)".to_string(), |p| p.display().to_string());
    table.add_row(vec!["Database", &database]);
    table.add_row(vec!["Table", &config.store.table]);
    table.add_row(vec![
        "Excluded authors",
        &config.store.excluded_authors.len().to_string(),
    ]);

    eprintln!("\n{table}");
    Ok(())
}

fn fmt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

/// clap value parser for YYYY-MM-DD
pub(crate) fn parse_date(s: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}
