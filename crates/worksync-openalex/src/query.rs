//! Query descriptors: immutable endpoint + filters + selection for one cursor chain

use chrono::NaiveDate;

use crate::cursor::Cursor;
use crate::transform::short_id;

/// OpenAlex works endpoint
pub const OPENALEX_WORKS: &str = "https://api.openalex.org/works";

/// Largest page the API serves
pub const MAX_PER_PAGE: u32 = 200;

/// Author ids per query; keeps the filter under the server's URL ceiling
pub const DEFAULT_CHUNK_SIZE: usize = 30;

/// URL length the API was observed to reject beyond
pub const MAX_URL_LEN: usize = 4094;

/// Fields requested for every work
pub const DEFAULT_SELECT: &[&str] = &[
    "id",
    "doi",
    "ids",
    "title",
    "display_name",
    "publication_year",
    "publication_date",
    "primary_location",
    "open_access",
    "authorships",
    "cited_by_count",
    "sustainable_development_goals",
    "type",
    "primary_topic",
    "is_retracted",
    "is_paratext",
    "updated_date",
    "created_date",
];

/// One filter predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Works with at least one affiliation to this ROR id
    Institution(String),
    /// Works by any of these authors (OR-joined)
    Authors(Vec<String>),
    FromDate(NaiveDate),
    ToDate(NaiveDate),
    /// Passed through verbatim, e.g. `type:article`
    Raw(String),
}

impl Filter {
    fn render(&self) -> String {
        match self {
            Self::Institution(ror) => format!("institutions.ror:{ror}"),
            Self::Authors(ids) => format!("authorships.author.id:{}", ids.join("|")),
            Self::FromDate(d) => format!("from_publication_date:{}", d.format("%Y-%m-%d")),
            Self::ToDate(d) => format!("to_publication_date:{}", d.format("%Y-%m-%d")),
            Self::Raw(s) => s.clone(),
        }
    }
}

/// Immutable description of one harvest query.
///
/// Built once, shared read-only by the fetcher. Each descriptor drives its
/// own cursor chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    endpoint: String,
    filters: Vec<Filter>,
    mailto: Option<String>,
    per_page: u32,
    select: Vec<String>,
    label: String,
    base_url: String,
}

impl QueryDescriptor {
    pub fn builder(endpoint: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(endpoint)
    }

    /// URL without the cursor parameter
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL for one page request
    pub fn page_url(&self, cursor: &Cursor) -> String {
        format!("{}&cursor={}", self.base_url, cursor.encoded())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn mailto(&self) -> Option<&str> {
        self.mailto.as_deref()
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn select(&self) -> &[String] {
        &self.select
    }

    /// Short name used in logs and progress bars
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Builder for [`QueryDescriptor`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    endpoint: String,
    filters: Vec<Filter>,
    mailto: Option<String>,
    per_page: u32,
    select: Vec<String>,
    label: Option<String>,
}

impl QueryBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            filters: Vec::new(),
            mailto: None,
            per_page: MAX_PER_PAGE,
            select: DEFAULT_SELECT.iter().map(|s| s.to_string()).collect(),
            label: None,
        }
    }

    pub fn institution(self, ror: impl Into<String>) -> Self {
        self.filter(Filter::Institution(ror.into()))
    }

    /// Author filter; ids may be short (`A123`) or full URLs
    pub fn authors<S: AsRef<str>>(self, ids: &[S]) -> Self {
        let ids = ids.iter().map(|id| short_id(id.as_ref()).to_string()).collect();
        self.filter(Filter::Authors(ids))
    }

    pub fn from_date(self, date: NaiveDate) -> Self {
        self.filter(Filter::FromDate(date))
    }

    pub fn to_date(self, date: NaiveDate) -> Self {
        self.filter(Filter::ToDate(date))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Contact address for the API's polite pool; blank is ignored
    pub fn mailto(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        self.mailto = (!email.trim().is_empty()).then(|| email.trim().to_string());
        self
    }

    /// Page size, clamped to 1..=200
    pub fn per_page(mut self, n: u32) -> Self {
        self.per_page = n.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn select<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.select = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn build(self) -> QueryDescriptor {
        let mut params = Vec::with_capacity(4);
        if !self.filters.is_empty() {
            let rendered: Vec<String> = self.filters.iter().map(Filter::render).collect();
            params.push(format!("filter={}", rendered.join(",")));
        }
        if let Some(email) = &self.mailto {
            params.push(format!("mailto={}", urlencoding::encode(email)));
        }
        params.push(format!("per-page={}", self.per_page));
        if !self.select.is_empty() {
            params.push(format!("select={}", self.select.join(",")));
        }
        let base_url = format!("{}?{}", self.endpoint, params.join("&"));

        if base_url.len() > MAX_URL_LEN {
            log::warn!(
                "Query URL is {} characters (server limit ~{MAX_URL_LEN}); use a smaller author chunk size",
                base_url.len()
            );
        }

        let label = self.label.unwrap_or_else(|| "works".to_string());
        QueryDescriptor {
            endpoint: self.endpoint,
            filters: self.filters,
            mailto: self.mailto,
            per_page: self.per_page,
            select: self.select,
            label,
            base_url,
        }
    }
}

/// Normalize, dedupe (first occurrence wins) and split author ids into chunks.
///
/// A `chunk_size` of 0 is treated as 1.
pub fn chunk_author_ids<S: AsRef<str>>(ids: &[S], chunk_size: usize) -> Vec<Vec<String>> {
    let mut seen = rustc_hash::FxHashSet::default();
    let unique: Vec<String> = ids
        .iter()
        .map(|id| short_id(id.as_ref().trim()).to_string())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect();
    unique
        .chunks(chunk_size.max(1))
        .map(<[String]>::to_vec)
        .collect()
}
