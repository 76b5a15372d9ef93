//! Work JSON → flat (work, author, institution) records

pub mod flatten;
pub mod record;
pub mod work;

/// Short form of an OpenAlex id (`https://openalex.org/W123` → `W123`).
///
/// Ids that are already short pass through unchanged.
pub fn short_id(id: &str) -> &str {
    id.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(id)
}

// Re-exports
pub use flatten::{INSTITUTION_NOT_PROVIDED, MISSING, flatten_pages, flatten_work, flatten_works};
pub use record::{FlatRecord, FlatRecordAccumulator, RecordKey};
pub use work::Work;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_forms() {
        assert_eq!(short_id("https://openalex.org/W2741809807"), "W2741809807");
        assert_eq!(short_id("A123"), "A123");
        assert_eq!(short_id("https://openalex.org/"), "https://openalex.org/");
        assert_eq!(short_id(""), "");
    }
}
