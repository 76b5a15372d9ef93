use std::path::PathBuf;

use crate::sql::DEFAULT_TABLE;

/// Where harvested rows are stored
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// DuckDB file; `None` keeps the table in memory
    pub database: Option<PathBuf>,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}
