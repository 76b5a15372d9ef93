//! Harvest request and fetch runtime settings

use chrono::NaiveDate;
use worksync_core::{HttpConfig, RetryPolicy};

use crate::query::{DEFAULT_CHUNK_SIZE, DEFAULT_SELECT, MAX_PER_PAGE, OPENALEX_WORKS};

/// What to harvest
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub endpoint: String,
    /// ROR id of the institution (e.g. "02wb73912"); `None` skips the institution shard
    pub institution_ror: Option<String>,
    /// Extra authors whose works are harvested regardless of affiliation
    pub author_ids: Vec<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    /// Polite-pool contact address
    pub mailto: Option<String>,
    pub per_page: u32,
    /// Author ids per query
    pub chunk_size: usize,
    pub select: Vec<String>,
}

impl Default for HarvestRequest {
    fn default() -> Self {
        Self {
            endpoint: OPENALEX_WORKS.to_string(),
            institution_ror: None,
            author_ids: Vec::new(),
            from_date: None,
            to_date: None,
            mailto: None,
            per_page: MAX_PER_PAGE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            select: DEFAULT_SELECT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HarvestRequest {
    /// Nothing to fetch: no institution and no authors
    pub fn is_empty(&self) -> bool {
        self.institution_ror.is_none() && self.author_ids.is_empty()
    }
}

/// How to fetch
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub retry: RetryPolicy,
    /// Shards fetched concurrently
    pub workers: usize,
    pub http: HttpConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            workers: 4,
            http: HttpConfig::default(),
        }
    }
}
