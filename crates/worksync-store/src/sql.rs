//! SQL generation for the flat works table.
//!
//! Table names are validated by [`valid_table_name`] before they reach any
//! of these builders, so plain interpolation is safe.

use worksync_openalex::schema::COLUMNS;

/// Table used when none is configured
pub const DEFAULT_TABLE: &str = "works";

/// Plain SQL identifier: ASCII letter or `_`, then letters, digits or `_`
pub fn valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Table with the composite (work, author, institution) key
pub fn create_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
           work_id VARCHAR NOT NULL,
           work_doi VARCHAR NOT NULL,
           work_title VARCHAR,
           work_display_name VARCHAR,
           work_publisher VARCHAR NOT NULL,
           work_journal VARCHAR NOT NULL,
           work_publication_year INTEGER,
           work_publication_date DATE,
           work_sustainable_dev_goal VARCHAR NOT NULL,
           work_type VARCHAR NOT NULL,
           work_topic VARCHAR NOT NULL,
           work_is_open_access BOOLEAN NOT NULL,
           work_cited_by_count INTEGER NOT NULL,
           work_created_date VARCHAR,
           work_updated_date VARCHAR,
           author_id VARCHAR NOT NULL,
           author_orcid VARCHAR NOT NULL,
           author_name VARCHAR,
           author_raw_name VARCHAR,
           author_position VARCHAR,
           author_is_corresponding BOOLEAN NOT NULL,
           institution_id VARCHAR NOT NULL,
           institution_name VARCHAR NOT NULL,
           institution_country_code VARCHAR NOT NULL,
           PRIMARY KEY (work_id, author_id, institution_id)
         )"
    )
}

/// Insert-ignore of one row; the date parameter is passed as `YYYY-MM-DD` text
pub fn insert_ignore(table: &str) -> String {
    let placeholders: Vec<&str> = COLUMNS
        .iter()
        .map(|c| {
            if *c == "work_publication_date" {
                "CAST(? AS DATE)"
            } else {
                "?"
            }
        })
        .collect();
    format!(
        "INSERT OR IGNORE INTO {table} ({}) VALUES ({})",
        COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

pub fn delete_author(table: &str) -> String {
    format!("DELETE FROM {table} WHERE author_id = ?")
}

pub fn row_count(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

pub fn distinct_works(table: &str) -> String {
    format!("SELECT COUNT(DISTINCT work_id) FROM {table}")
}

/// Every row in key order, date rendered as text
pub fn select_all(table: &str) -> String {
    let cols: Vec<String> = COLUMNS
        .iter()
        .map(|c| {
            if *c == "work_publication_date" {
                format!("CAST({c} AS VARCHAR)")
            } else {
                c.to_string()
            }
        })
        .collect();
    format!(
        "SELECT {} FROM {table} ORDER BY work_id, author_id, institution_id",
        cols.join(", ")
    )
}
