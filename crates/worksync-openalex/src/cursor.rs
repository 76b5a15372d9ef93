//! Opaque server-issued pagination token

use std::borrow::Cow;
use std::fmt;

/// Pagination cursor. `*` asks the server to start a new cursor chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub const START: &'static str = "*";

    pub fn start() -> Self {
        Self(Self::START.to_string())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Cursor from a `meta.next_cursor` value; null and empty both mean "no more pages"
    pub fn from_next(next: Option<&str>) -> Option<Self> {
        next.filter(|s| !s.is_empty()).map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_start(&self) -> bool {
        self.0 == Self::START
    }

    /// Value safe to put in a query string
    pub fn encoded(&self) -> Cow<'_, str> {
        if self.is_start() {
            return Cow::Borrowed(Self::START);
        }
        urlencoding::encode(&self.0)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_sentinel() {
        let c = Cursor::start();
        assert!(c.is_start());
        assert_eq!(c.as_str(), "*");
        assert_eq!(c.encoded(), "*");
        assert_eq!(Cursor::default(), c);
    }

    #[test]
    fn from_next_null_or_empty_ends_stream() {
        assert_eq!(Cursor::from_next(None), None);
        assert_eq!(Cursor::from_next(Some("")), None);
        assert_eq!(Cursor::from_next(Some("abc")), Some(Cursor::new("abc")));
    }

    #[test]
    fn encoded_escapes_reserved_characters() {
        let c = Cursor::new("IlsxNjk=+/x");
        assert_eq!(c.encoded(), "IlsxNjk%3D%2B%2Fx");
        assert!(!c.is_start());
    }

    #[test]
    fn display_is_raw_token() {
        assert_eq!(Cursor::new("a=b").to_string(), "a=b");
    }
}
