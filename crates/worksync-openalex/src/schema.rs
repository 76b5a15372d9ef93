//! Arrow schema for the flat (work, author, institution) snapshot

use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Schema};

/// Column names in storage order; shared with the DuckDB table definition
pub const COLUMNS: &[&str] = &[
    "work_id",
    "work_doi",
    "work_title",
    "work_display_name",
    "work_publisher",
    "work_journal",
    "work_publication_year",
    "work_publication_date",
    "work_sustainable_dev_goal",
    "work_type",
    "work_topic",
    "work_is_open_access",
    "work_cited_by_count",
    "work_created_date",
    "work_updated_date",
    "author_id",
    "author_orcid",
    "author_name",
    "author_raw_name",
    "author_position",
    "author_is_corresponding",
    "institution_id",
    "institution_name",
    "institution_country_code",
];

/// works_flat.parquet: one row per (work, author, institution)
///
/// Sentinel-filled columns (`-1`, "not provided in source metadata") are
/// non-nullable; columns without a sentinel stay nullable.
pub fn flat_records() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            // Work
            Field::new("work_id", DataType::Utf8, false), // e.g., "W2741809807"
            Field::new("work_doi", DataType::Utf8, false),
            Field::new("work_title", DataType::Utf8, true),
            Field::new("work_display_name", DataType::Utf8, true),
            Field::new("work_publisher", DataType::Utf8, false),
            Field::new("work_journal", DataType::Utf8, false),
            Field::new("work_publication_year", DataType::Int32, true),
            Field::new("work_publication_date", DataType::Date32, true),
            Field::new("work_sustainable_dev_goal", DataType::Utf8, false),
            Field::new("work_type", DataType::Utf8, false),
            Field::new("work_topic", DataType::Utf8, false),
            Field::new("work_is_open_access", DataType::Boolean, false),
            Field::new("work_cited_by_count", DataType::Int32, false),
            Field::new("work_created_date", DataType::Utf8, true),
            Field::new("work_updated_date", DataType::Utf8, true),
            // Author
            Field::new("author_id", DataType::Utf8, false), // e.g., "A5023888391"
            Field::new("author_orcid", DataType::Utf8, false),
            Field::new("author_name", DataType::Utf8, true),
            Field::new("author_raw_name", DataType::Utf8, true),
            Field::new("author_position", DataType::Utf8, true), // first, middle, last
            Field::new("author_is_corresponding", DataType::Boolean, false),
            // Institution
            Field::new("institution_id", DataType::Utf8, false),
            Field::new("institution_name", DataType::Utf8, false),
            Field::new("institution_country_code", DataType::Utf8, false),
        ]))
    });
    &SCHEMA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_list_matches_schema() {
        let names: Vec<&str> = flat_records()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, COLUMNS);
    }

    #[test]
    fn key_columns_not_nullable() {
        let schema = flat_records();
        for key in ["work_id", "author_id", "institution_id"] {
            assert!(!schema.field_with_name(key).unwrap().is_nullable());
        }
    }
}
