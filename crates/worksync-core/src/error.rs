//! Transport-level error type shared by every HTTP caller

/// Error from a single HTTP request.
///
/// Only transport problems live here. Whether a response body makes sense is
/// decided by the caller, so a 200 with garbage is never a `TransportError`.
#[derive(Debug)]
pub enum TransportError {
    /// HTTP error with optional status code (no status = connect/timeout/body failure)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request that cannot succeed on retry (bad URL, redirect loop, undecodable body)
    Request(String),
    /// I/O error below the HTTP layer
    Io(std::io::Error),
    /// Request abandoned because cancellation was requested
    Cancelled,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Request(message) => write!(f, "request error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so that the polite-pool address never ends up in logs.
    /// Builder, redirect and decode failures become [`TransportError::Request`].
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_builder() || e.is_redirect() || e.is_decode() {
            return Self::Request(e.without_url().to_string());
        }
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    /// Whether retrying the same request can succeed.
    ///
    /// Transient: no status (connect reset, timeout), 429 and 5xx.
    /// Any other status is an application-level answer and is final.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status: None, .. } => true,
            Self::Http {
                status: Some(s), ..
            } => *s == 429 || (500..=599).contains(s),
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
            Self::Request(_) | Self::Cancelled => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    fn http_err(status: u16) -> TransportError {
        TransportError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_5xx_transient() {
        assert!(http_err(500).is_transient());
        assert!(http_err(502).is_transient());
        assert!(http_err(503).is_transient());
        assert!(http_err(599).is_transient());
    }

    #[test]
    fn http_429_transient() {
        assert!(http_err(429).is_transient());
    }

    #[test]
    fn http_4xx_not_transient() {
        assert!(!http_err(400).is_transient());
        assert!(!http_err(403).is_transient());
        assert!(!http_err(404).is_transient());
    }

    #[test]
    fn http_none_status_transient() {
        let err = TransportError::Http {
            status: None,
            message: "connection reset".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn request_error_not_transient() {
        let err = TransportError::Request("builder error".to_string());
        assert!(!err.is_transient());
        assert_eq!(err.status(), None);
        assert_eq!(format!("{err}"), "request error: builder error");
    }

    #[test]
    fn io_timeout_transient() {
        let err = TransportError::Io(std::io::Error::new(ErrorKind::TimedOut, "timeout"));
        assert!(err.is_transient());
    }

    #[test]
    fn io_storage_full_not_transient() {
        let err = TransportError::Io(std::io::Error::new(ErrorKind::StorageFull, "disk full"));
        assert!(!err.is_transient());
    }

    #[test]
    fn cancelled_not_transient() {
        assert!(!TransportError::Cancelled.is_transient());
    }

    #[test]
    fn status_accessor() {
        assert_eq!(http_err(503).status(), Some(503));
        assert_eq!(TransportError::Cancelled.status(), None);
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = TransportError::Http {
            status: None,
            message: "timeout".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: timeout");
    }

    #[test]
    fn display_io_error() {
        let err = TransportError::Io(std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert!(format!("{err}").contains("IO error"));
    }
}
