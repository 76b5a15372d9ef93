//! worksync core - shared infrastructure for the harvesting pipeline
//!
//! Transport errors, a blocking HTTP facade, retry policy, cancellation,
//! logging, progress and the parquet snapshot sink.

pub mod accumulator;
pub mod error;
pub mod http;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod sink;
pub mod work_queue;

// Re-exports for convenience
pub use accumulator::{Accumulator, drain_rows};
pub use error::TransportError;
pub use http::{HttpClient, HttpConfig, SHARED_RUNTIME};
pub use logging::{IndicatifLogger, init_logging, redact_mailto};
pub use progress::{ProgressContext, SharedProgress, fmt_num, should_report};
pub use retry::{Backoff, RetryError, RetryPolicy, Transient, retry_transient, sleep_cancellable};
pub use shutdown::CancelToken;
pub use sink::{ParquetSink, is_valid_parquet};
pub use work_queue::WorkQueue;
