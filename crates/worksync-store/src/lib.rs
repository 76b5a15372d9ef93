//! worksync-store: DuckDB-backed idempotent sink for flat work records
//!
//! One table keyed by (work_id, author_id, institution_id). Inserts use
//! `INSERT OR IGNORE`, so loading the same harvest twice leaves the table
//! unchanged, and the exclusion purge can be re-run at any time.

mod config;
mod sql;

pub use config::StoreConfig;
pub use sql::{DEFAULT_TABLE, valid_table_name};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use duckdb::{Connection, params};
use worksync_openalex::{ExclusionList, FlatRecord, RecordSink, SinkError, UpsertOutcome};

/// DuckDB table behind a mutex; safe to share between shard workers
pub struct DuckDbSink {
    conn: Mutex<Connection>,
    table: String,
    insert_sql: String,
    delete_sql: String,
}

impl std::fmt::Debug for DuckDbSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbSink")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl DuckDbSink {
    pub fn open(config: &StoreConfig) -> Result<Self, SinkError> {
        match &config.database {
            Some(path) => Self::open_path(path, &config.table),
            None => Self::in_memory(&config.table),
        }
    }

    /// Open (or create) a database file and ensure the table exists
    pub fn open_path(path: &Path, table: &str) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(SinkError::backend)?;
        }
        log::debug!("Opening DuckDB at {}", path.display());
        let conn = Connection::open(path).map_err(SinkError::backend)?;
        Self::with_connection(conn, table)
    }

    pub fn in_memory(table: &str) -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory().map_err(SinkError::backend)?;
        Self::with_connection(conn, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self, SinkError> {
        if !valid_table_name(table) {
            return Err(SinkError::InvalidTable(table.to_string()));
        }
        conn.execute_batch(&sql::create_table(table))
            .map_err(SinkError::backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            insert_sql: sql::insert_ignore(table),
            delete_sql: sql::delete_author(table),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SinkError> {
        self.conn.lock().map_err(|_| SinkError::Poisoned)
    }

    fn count(&self, query: &str) -> Result<u64, SinkError> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(query, [], |row| row.get(0))
            .map_err(SinkError::backend)?;
        Ok(n as u64)
    }

    pub fn row_count(&self) -> Result<u64, SinkError> {
        self.count(&sql::row_count(&self.table))
    }

    pub fn distinct_works(&self) -> Result<u64, SinkError> {
        self.count(&sql::distinct_works(&self.table))
    }

    /// All stored rows in key order
    pub fn records(&self) -> Result<Vec<FlatRecord>, SinkError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql::select_all(&self.table))
            .map_err(SinkError::backend)?;
        let rows = stmt
            .query_map([], |row| {
                let date: Option<String> = row.get(7)?;
                Ok(FlatRecord {
                    work_id: row.get(0)?,
                    work_doi: row.get(1)?,
                    work_title: row.get(2)?,
                    work_display_name: row.get(3)?,
                    work_publisher: row.get(4)?,
                    work_journal: row.get(5)?,
                    work_publication_year: row.get(6)?,
                    work_publication_date: date
                        .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                    work_sustainable_dev_goal: row.get(8)?,
                    work_type: row.get(9)?,
                    work_topic: row.get(10)?,
                    work_is_open_access: row.get(11)?,
                    work_cited_by_count: row.get(12)?,
                    work_created_date: row.get(13)?,
                    work_updated_date: row.get(14)?,
                    author_id: row.get(15)?,
                    author_orcid: row.get(16)?,
                    author_name: row.get(17)?,
                    author_raw_name: row.get(18)?,
                    author_position: row.get(19)?,
                    author_is_corresponding: row.get(20)?,
                    institution_id: row.get(21)?,
                    institution_name: row.get(22)?,
                    institution_country_code: row.get(23)?,
                })
            })
            .map_err(SinkError::backend)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SinkError::backend)
    }
}

impl RecordSink for DuckDbSink {
    fn upsert(&self, record: &FlatRecord) -> Result<UpsertOutcome, SinkError> {
        let date = record
            .work_publication_date
            .map(|d| d.format("%Y-%m-%d").to_string());
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&self.insert_sql)
            .map_err(SinkError::backend)?;
        let changed = stmt
            .execute(params![
                record.work_id,
                record.work_doi,
                record.work_title,
                record.work_display_name,
                record.work_publisher,
                record.work_journal,
                record.work_publication_year,
                date,
                record.work_sustainable_dev_goal,
                record.work_type,
                record.work_topic,
                record.work_is_open_access,
                record.work_cited_by_count,
                record.work_created_date,
                record.work_updated_date,
                record.author_id,
                record.author_orcid,
                record.author_name,
                record.author_raw_name,
                record.author_position,
                record.author_is_corresponding,
                record.institution_id,
                record.institution_name,
                record.institution_country_code,
            ])
            .map_err(SinkError::backend)?;
        Ok(if changed > 0 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Skipped
        })
    }

    /// One `DELETE` per excluded id, committed together
    fn delete_authors(&self, excluded: &ExclusionList) -> Result<usize, SinkError> {
        if excluded.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(SinkError::backend)?;
        let mut removed = 0usize;
        for id in excluded.ids() {
            let n = tx
                .execute(&self.delete_sql, params![id])
                .map_err(SinkError::backend)?;
            log::debug!("purged {n} rows for author {id}");
            removed += n;
        }
        tx.commit().map_err(SinkError::backend)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_table_rejected() {
        let err = DuckDbSink::in_memory("works; DROP TABLE x").unwrap_err();
        assert!(matches!(err, SinkError::InvalidTable(_)));
    }

    #[test]
    fn empty_table_counts() {
        let sink = DuckDbSink::in_memory(DEFAULT_TABLE).unwrap();
        assert_eq!(sink.table(), "works");
        assert_eq!(sink.row_count().unwrap(), 0);
        assert_eq!(sink.distinct_works().unwrap(), 0);
        assert!(sink.records().unwrap().is_empty());
    }

    #[test]
    fn open_default_config_is_in_memory() {
        let sink = DuckDbSink::open(&StoreConfig::default()).unwrap();
        assert_eq!(sink.row_count().unwrap(), 0);
    }

    #[test]
    fn empty_exclusion_touches_nothing() {
        let sink = DuckDbSink::in_memory("t").unwrap();
        assert_eq!(sink.delete_authors(&ExclusionList::default()).unwrap(), 0);
    }
}
