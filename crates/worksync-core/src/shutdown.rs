//! Cooperative cancellation via shared atomic flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

/// Cloneable cancellation handle.
///
/// Every clone observes the same flag. Long-running work (page requests,
/// retry cool-downs) polls it and stops at the next check point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide token, set by the SIGINT/SIGTERM handler
    pub fn global() -> &'static CancelToken {
        static GLOBAL: LazyLock<CancelToken> = LazyLock::new(CancelToken::new);
        &GLOBAL
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Set the flag, returning whether it was already set.
    ///
    /// Signal handlers use this to escalate a second Ctrl-C into a hard exit.
    pub fn cancel_again(&self) -> bool {
        self.flag.swap(true, Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn independent_tokens() {
        let a = CancelToken::new();
        let b = CancelToken::new();
        a.cancel();
        assert!(!b.is_cancelled());
    }

    #[test]
    fn cancel_again_reports_previous_state() {
        let token = CancelToken::new();
        assert!(!token.cancel_again());
        assert!(token.cancel_again());
    }
}
