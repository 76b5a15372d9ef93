//! One decoded response page of the cursor chain

use serde::Deserialize;

use crate::cursor::Cursor;
use crate::transform::Work;

/// `meta` block of a list response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    /// Total results the server reports for the whole query
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Decoded page. Both `meta` and `results` must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage {
    pub meta: PageMeta,
    pub results: Vec<Work>,
}

impl RawPage {
    pub fn parse(body: &str) -> Result<Self, sonic_rs::Error> {
        sonic_rs::from_str(body)
    }

    /// Cursor for the following request, if the chain continues
    pub fn next_cursor(&self) -> Option<Cursor> {
        Cursor::from_next(self.meta.next_cursor.as_deref())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Result of one successful request
#[derive(Debug)]
pub enum PageOutcome {
    Page(RawPage),
    /// Zero results: the chain is finished regardless of `next_cursor`
    EndOfStream,
}

impl From<RawPage> for PageOutcome {
    fn from(page: RawPage) -> Self {
        if page.is_empty() {
            Self::EndOfStream
        } else {
            Self::Page(page)
        }
    }
}
