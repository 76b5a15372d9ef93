//! Fetch and sink error types

use worksync_core::TransportError;

use crate::cursor::Cursor;

/// Where in a cursor chain a fetch stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Query label
    pub query: String,
    /// Cursor of the request that failed; pass it back to resume
    pub cursor: Cursor,
    /// Pages collected before the failure
    pub pages: usize,
    /// Works collected before the failure
    pub items_processed: usize,
    /// `meta.count` from the last good page, if any
    pub total_reported: Option<u64>,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at cursor {} after {} pages, {}",
            self.query, self.cursor, self.pages, self.items_processed
        )?;
        match self.total_reported {
            Some(total) => write!(f, "/{total} works"),
            None => write!(f, " works"),
        }
    }
}

/// Terminal failure of a cursor chain.
///
/// Every variant carries the [`Position`] so a caller can report progress
/// and resume from the failed cursor.
#[derive(Debug)]
pub enum FetchError {
    /// Transient failures on one cursor outlasted the retry budget
    RetriesExceeded {
        position: Position,
        retries: u32,
        last_error: TransportError,
    },
    /// Response body could not be decoded
    Malformed { position: Position, message: String },
    /// Non-transient HTTP status
    Http {
        position: Position,
        source: TransportError,
    },
    Cancelled { position: Position },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RetriesExceeded {
                position,
                retries,
                last_error,
            } => write!(
                f,
                "retries exceeded ({retries}) for {position}: {last_error}"
            ),
            Self::Malformed { position, message } => {
                write!(f, "malformed response for {position}: {message}")
            }
            Self::Http { position, source } => write!(f, "{source} for {position}"),
            Self::Cancelled { position } => write!(f, "cancelled: {position}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RetriesExceeded { last_error, .. } => Some(last_error),
            Self::Http { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl FetchError {
    pub fn position(&self) -> &Position {
        match self {
            Self::RetriesExceeded { position, .. }
            | Self::Malformed { position, .. }
            | Self::Http { position, .. }
            | Self::Cancelled { position } => position,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.position().cursor
    }

    pub fn items_processed(&self) -> usize {
        self.position().items_processed
    }

    pub fn total_reported(&self) -> Option<u64> {
        self.position().total_reported
    }

    /// Retries spent on the failing cursor (0 unless retries were exceeded)
    pub fn retries(&self) -> u32 {
        match self {
            Self::RetriesExceeded { retries, .. } => *retries,
            _ => 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Store-side failure
#[derive(Debug)]
pub enum SinkError {
    /// Table name is not a plain SQL identifier
    InvalidTable(String),
    /// Lock poisoned by a panicking writer
    Poisoned,
    /// Error reported by the storage backend
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTable(name) => write!(f, "invalid table name: {name:?}"),
            Self::Poisoned => write!(f, "sink lock poisoned"),
            Self::Backend(e) => write!(f, "store: {e}"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl SinkError {
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(e))
    }
}
