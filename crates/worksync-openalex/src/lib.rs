//! worksync OpenAlex - cursor-paginated harvesting of OpenAlex works
//!
//! Walks one cursor chain per query, flattens each work into
//! (work, author, institution) rows and loads them into an idempotent sink.
//!
//! # Example
//!
//! ```no_run
//! use rustc_hash::FxHashMap;
//! use worksync_core::{CancelToken, ProgressContext};
//! use worksync_openalex::{
//!     FetchConfig, HarvestRequest, HttpTransport, MemorySink, ExclusionList,
//!     build_shards, fetch_and_structure, load,
//! };
//!
//! let request = HarvestRequest {
//!     institution_ror: Some("02wb73912".into()),
//!     ..Default::default()
//! };
//! let config = FetchConfig::default();
//! let transport = HttpTransport::new(&config.http)?;
//! let harvest = fetch_and_structure(
//!     &build_shards(&request),
//!     &transport,
//!     &config,
//!     &CancelToken::new(),
//!     &FxHashMap::default(),
//!     &ProgressContext::hidden(),
//! );
//! let sink = MemorySink::new();
//! let report = load(&harvest, &sink, &ExclusionList::default())?;
//! println!("{} rows inserted", report.inserted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod fetcher;
pub mod page;
pub mod query;
pub mod runner;
pub mod schema;
pub mod sink;
pub mod transform;

// Re-exports for convenience
pub use config::{FetchConfig, HarvestRequest};
pub use cursor::Cursor;
pub use error::{FetchError, Position, SinkError};
pub use fetcher::{HttpTransport, PageFetcher, Transport};
pub use page::{PageMeta, PageOutcome, RawPage};
pub use query::{Filter, QueryBuilder, QueryDescriptor, chunk_author_ids};
pub use runner::{
    Harvest, RunSummary, ShardResult, build_shards, fetch_and_structure, load, purge,
    write_snapshot,
};
pub use sink::{ExclusionList, LoadReport, MemorySink, RecordFailure, RecordSink, UpsertOutcome};
pub use transform::{
    FlatRecord, FlatRecordAccumulator, INSTITUTION_NOT_PROVIDED, MISSING, Work, flatten_pages,
    flatten_work, flatten_works,
};
