//! Bounded retry with cool-down for transient transport failures

use std::fmt::Display;
use std::time::{Duration, Instant};

use crate::error::TransportError;
use crate::shutdown::CancelToken;

/// Slice length for cancellable sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Upper bound for exponential delays
const MAX_DELAY: Duration = Duration::from_secs(15 * 60);

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Same cool-down before every retry
    #[default]
    Fixed,
    /// cool-down × 2^(retry-1), capped at 15 minutes
    Exponential,
}

impl Backoff {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "fixed" => Some(Self::Fixed),
            "exponential" => Some(Self::Exponential),
            _ => None,
        }
    }
}

/// Retry limits for a single request position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Base sleep before a retry
    pub cooldown: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

    /// Policy that retries immediately (tests, local mirrors)
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            cooldown: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    /// Sleep before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.cooldown,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.cooldown.saturating_mul(factor).min(MAX_DELAY)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            cooldown: Self::DEFAULT_COOLDOWN,
            backoff: Backoff::Fixed,
        }
    }
}

/// Errors that can tell whether a retry may help
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for TransportError {
    fn is_transient(&self) -> bool {
        TransportError::is_transient(self)
    }
}

/// Why [`retry_transient`] gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed transiently; `attempts` = max_retries + 1
    Exhausted { attempts: u32, last: E },
    /// First non-transient failure, returned unmodified
    Fatal(E),
    /// Cancellation observed before, during or between attempts
    Cancelled,
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {attempts} attempts: {last}")
            }
            Self::Fatal(e) => write!(f, "{e}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl<E: std::fmt::Debug + Display> std::error::Error for RetryError<E> {}

/// Run `attempt_fn` until it succeeds, fails non-transiently, or the retry
/// budget is spent.
///
/// The counter is local to this call: callers that move through positions
/// (cursors, shards) call it once per position and get a fresh budget each time.
pub fn retry_transient<T, E: Transient + Display>(
    label: &str,
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut attempt_fn: impl FnMut() -> Result<T, E>,
) -> Result<T, RetryError<E>> {
    let mut retries = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() => {
                if retries >= policy.max_retries {
                    log::error!("{label}: failed permanently after {} attempts: {e}", retries + 1);
                    return Err(RetryError::Exhausted {
                        attempts: retries + 1,
                        last: e,
                    });
                }
                retries += 1;
                let delay = policy.delay(retries);
                log::warn!(
                    "{label}: {e}, retry {retries}/{} in {:.0?}",
                    policy.max_retries,
                    delay
                );
                if !sleep_cancellable(delay, cancel) {
                    return Err(RetryError::Cancelled);
                }
            }
            Err(_) if cancel.is_cancelled() => return Err(RetryError::Cancelled),
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }
}

/// Sleep for `duration`, waking early on cancellation.
///
/// Returns `false` if the sleep was cut short.
pub fn sleep_cancellable(duration: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
