//! Work → flat rows, one per (work, author, institution)

use super::record::FlatRecord;
use super::short_id;
use super::work::{Author, Authorship, Institution, Work};
use crate::page::RawPage;

/// Placeholder for a missing scalar value.
///
/// Also used for a missing author or institution id, so two id-less
/// authorships on the same work and institution share a key.
pub const MISSING: &str = "-1";

/// Placeholder for all three institution columns when an authorship lists no institution
pub const INSTITUTION_NOT_PROVIDED: &str = "not provided in source metadata";

fn or_missing(value: Option<&str>) -> String {
    value.unwrap_or(MISSING).to_string()
}

/// Work-level columns shared by every row of one work
struct WorkColumns<'a> {
    work: &'a Work,
    id: String,
    doi: String,
    publisher: String,
    journal: String,
    goal: String,
    work_type: String,
    topic: String,
    publication_date: Option<chrono::NaiveDate>,
}

impl<'a> WorkColumns<'a> {
    fn new(work: &'a Work) -> Self {
        Self {
            work,
            id: work.short_id().to_string(),
            doi: or_missing(work.doi()),
            publisher: or_missing(work.publisher()),
            journal: or_missing(work.journal()),
            goal: or_missing(work.first_goal()),
            work_type: or_missing(work.work_type.as_deref()),
            topic: or_missing(work.topic()),
            publication_date: work.publication_date(),
        }
    }

    fn row(
        &self,
        authorship: &Authorship,
        author: &Author,
        institution: Option<&Institution>,
    ) -> FlatRecord {
        let (institution_id, institution_name, institution_country_code) = match institution {
            Some(inst) => (
                or_missing(inst.id.as_deref().map(short_id)),
                or_missing(inst.display_name.as_deref()),
                or_missing(inst.country_code.as_deref()),
            ),
            None => (
                INSTITUTION_NOT_PROVIDED.to_string(),
                INSTITUTION_NOT_PROVIDED.to_string(),
                INSTITUTION_NOT_PROVIDED.to_string(),
            ),
        };
        FlatRecord {
            work_id: self.id.clone(),
            work_doi: self.doi.clone(),
            work_title: self.work.title.clone(),
            work_display_name: self.work.display_name.clone(),
            work_publisher: self.publisher.clone(),
            work_journal: self.journal.clone(),
            work_publication_year: self.work.publication_year,
            work_publication_date: self.publication_date,
            work_sustainable_dev_goal: self.goal.clone(),
            work_type: self.work_type.clone(),
            work_topic: self.topic.clone(),
            work_is_open_access: self.work.is_oa(),
            work_cited_by_count: self.work.cited_by_count.unwrap_or(0),
            work_created_date: self.work.created_date.clone(),
            work_updated_date: self.work.updated_date.clone(),
            author_id: or_missing(author.id.as_deref().map(short_id)),
            author_orcid: or_missing(author.orcid.as_deref()),
            author_name: author.display_name.clone(),
            author_raw_name: authorship.raw_author_name.clone(),
            author_position: authorship.author_position.clone(),
            author_is_corresponding: authorship.is_corresponding.unwrap_or(false),
            institution_id,
            institution_name,
            institution_country_code,
        }
    }
}

/// Expand one work into its flat rows.
///
/// Authorships keep input order; within an authorship, institutions keep
/// input order. An authorship without institutions still yields one row.
pub fn flatten_work(work: &Work) -> Vec<FlatRecord> {
    let cols = WorkColumns::new(work);
    let mut rows = Vec::with_capacity(work.fan_out());
    for (authorship, author) in work.authorships() {
        let before = rows.len();
        rows.extend(
            authorship
                .institutions()
                .map(|inst| cols.row(authorship, author, Some(inst))),
        );
        if rows.len() == before {
            rows.push(cols.row(authorship, author, None));
        }
    }
    rows
}

pub fn flatten_works<'a>(works: impl IntoIterator<Item = &'a Work>) -> Vec<FlatRecord> {
    works.into_iter().flat_map(flatten_work).collect()
}

/// Flatten every work of every page, keeping page order
pub fn flatten_pages(pages: &[RawPage]) -> Vec<FlatRecord> {
    flatten_works(pages.iter().flat_map(|p| &p.results))
}
