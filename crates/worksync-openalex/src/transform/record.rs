//! Flat output row and its Arrow accumulator

use std::sync::Arc;

use arrow::array::*;
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use chrono::NaiveDate;
use worksync_core::Accumulator;
use worksync_core::accumulator::DEFAULT_BATCH_SIZE;

use crate::schema;

/// One (work, author, institution) row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    pub work_id: String,
    pub work_doi: String,
    pub work_title: Option<String>,
    pub work_display_name: Option<String>,
    pub work_publisher: String,
    pub work_journal: String,
    pub work_publication_year: Option<i32>,
    pub work_publication_date: Option<NaiveDate>,
    pub work_sustainable_dev_goal: String,
    pub work_type: String,
    pub work_topic: String,
    pub work_is_open_access: bool,
    pub work_cited_by_count: i32,
    pub work_created_date: Option<String>,
    pub work_updated_date: Option<String>,
    pub author_id: String,
    pub author_orcid: String,
    pub author_name: Option<String>,
    pub author_raw_name: Option<String>,
    pub author_position: Option<String>,
    pub author_is_corresponding: bool,
    pub institution_id: String,
    pub institution_name: String,
    pub institution_country_code: String,
}

/// Uniqueness key in the store
pub type RecordKey = (String, String, String);

impl FlatRecord {
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.work_id, &self.author_id, &self.institution_id)
    }

    pub fn owned_key(&self) -> RecordKey {
        (
            self.work_id.clone(),
            self.author_id.clone(),
            self.institution_id.clone(),
        )
    }
}

/// Days between 1970-01-01 and `date`, as Arrow's Date32 stores it
fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

/// Columnar buffer for [`FlatRecord`]s
pub struct FlatRecordAccumulator {
    schema: Arc<Schema>,
    work_id: Vec<String>,
    work_doi: Vec<String>,
    work_title: Vec<Option<String>>,
    work_display_name: Vec<Option<String>>,
    work_publisher: Vec<String>,
    work_journal: Vec<String>,
    work_publication_year: Vec<Option<i32>>,
    work_publication_date: Vec<Option<i32>>,
    work_sustainable_dev_goal: Vec<String>,
    work_type: Vec<String>,
    work_topic: Vec<String>,
    work_is_open_access: Vec<bool>,
    work_cited_by_count: Vec<i32>,
    work_created_date: Vec<Option<String>>,
    work_updated_date: Vec<Option<String>>,
    author_id: Vec<String>,
    author_orcid: Vec<String>,
    author_name: Vec<Option<String>>,
    author_raw_name: Vec<Option<String>>,
    author_position: Vec<Option<String>>,
    author_is_corresponding: Vec<bool>,
    institution_id: Vec<String>,
    institution_name: Vec<String>,
    institution_country_code: Vec<String>,
}

impl FlatRecordAccumulator {
    pub fn new() -> Self {
        let cap = DEFAULT_BATCH_SIZE;
        Self {
            schema: schema::flat_records().clone(),
            work_id: Vec::with_capacity(cap),
            work_doi: Vec::with_capacity(cap),
            work_title: Vec::with_capacity(cap),
            work_display_name: Vec::with_capacity(cap),
            work_publisher: Vec::with_capacity(cap),
            work_journal: Vec::with_capacity(cap),
            work_publication_year: Vec::with_capacity(cap),
            work_publication_date: Vec::with_capacity(cap),
            work_sustainable_dev_goal: Vec::with_capacity(cap),
            work_type: Vec::with_capacity(cap),
            work_topic: Vec::with_capacity(cap),
            work_is_open_access: Vec::with_capacity(cap),
            work_cited_by_count: Vec::with_capacity(cap),
            work_created_date: Vec::with_capacity(cap),
            work_updated_date: Vec::with_capacity(cap),
            author_id: Vec::with_capacity(cap),
            author_orcid: Vec::with_capacity(cap),
            author_name: Vec::with_capacity(cap),
            author_raw_name: Vec::with_capacity(cap),
            author_position: Vec::with_capacity(cap),
            author_is_corresponding: Vec::with_capacity(cap),
            institution_id: Vec::with_capacity(cap),
            institution_name: Vec::with_capacity(cap),
            institution_country_code: Vec::with_capacity(cap),
        }
    }
}

impl Default for FlatRecordAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for FlatRecordAccumulator {
    type Row = FlatRecord;

    fn push(&mut self, row: FlatRecord) {
        self.work_id.push(row.work_id);
        self.work_doi.push(row.work_doi);
        self.work_title.push(row.work_title);
        self.work_display_name.push(row.work_display_name);
        self.work_publisher.push(row.work_publisher);
        self.work_journal.push(row.work_journal);
        self.work_publication_year.push(row.work_publication_year);
        self.work_publication_date
            .push(row.work_publication_date.map(days_since_epoch));
        self.work_sustainable_dev_goal
            .push(row.work_sustainable_dev_goal);
        self.work_type.push(row.work_type);
        self.work_topic.push(row.work_topic);
        self.work_is_open_access.push(row.work_is_open_access);
        self.work_cited_by_count.push(row.work_cited_by_count);
        self.work_created_date.push(row.work_created_date);
        self.work_updated_date.push(row.work_updated_date);
        self.author_id.push(row.author_id);
        self.author_orcid.push(row.author_orcid);
        self.author_name.push(row.author_name);
        self.author_raw_name.push(row.author_raw_name);
        self.author_position.push(row.author_position);
        self.author_is_corresponding
            .push(row.author_is_corresponding);
        self.institution_id.push(row.institution_id);
        self.institution_name.push(row.institution_name);
        self.institution_country_code
            .push(row.institution_country_code);
    }

    fn len(&self) -> usize {
        self.work_id.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        use std::mem::take;

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(take(&mut self.work_id))),
            Arc::new(StringArray::from(take(&mut self.work_doi))),
            Arc::new(StringArray::from(take(&mut self.work_title))),
            Arc::new(StringArray::from(take(&mut self.work_display_name))),
            Arc::new(StringArray::from(take(&mut self.work_publisher))),
            Arc::new(StringArray::from(take(&mut self.work_journal))),
            Arc::new(Int32Array::from(take(&mut self.work_publication_year))),
            Arc::new(Date32Array::from(take(&mut self.work_publication_date))),
            Arc::new(StringArray::from(take(
                &mut self.work_sustainable_dev_goal,
            ))),
            Arc::new(StringArray::from(take(&mut self.work_type))),
            Arc::new(StringArray::from(take(&mut self.work_topic))),
            Arc::new(BooleanArray::from(take(&mut self.work_is_open_access))),
            Arc::new(Int32Array::from(take(&mut self.work_cited_by_count))),
            Arc::new(StringArray::from(take(&mut self.work_created_date))),
            Arc::new(StringArray::from(take(&mut self.work_updated_date))),
            Arc::new(StringArray::from(take(&mut self.author_id))),
            Arc::new(StringArray::from(take(&mut self.author_orcid))),
            Arc::new(StringArray::from(take(&mut self.author_name))),
            Arc::new(StringArray::from(take(&mut self.author_raw_name))),
            Arc::new(StringArray::from(take(&mut self.author_position))),
            Arc::new(BooleanArray::from(take(
                &mut self.author_is_corresponding,
            ))),
            Arc::new(StringArray::from(take(&mut self.institution_id))),
            Arc::new(StringArray::from(take(&mut self.institution_name))),
            Arc::new(StringArray::from(take(
                &mut self.institution_country_code,
            ))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}
