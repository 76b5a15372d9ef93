//! Work JSON model as returned by the `/works` endpoint
//!
//! Only the fields the flattener reads are modelled. Everything except `id`
//! is optional, and JSON `null` is accepted wherever an array is expected.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::short_id;

/// Treat an explicit `null` like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// OpenAlex Work
#[derive(Debug, Clone, Deserialize)]
pub struct Work {
    /// OpenAlex ID (e.g., "https://openalex.org/W2741809807")
    pub id: String,

    #[serde(default)]
    pub doi: Option<String>,

    /// IDs from other systems; `ids.doi` wins over the top-level `doi`
    #[serde(default)]
    pub ids: Option<ExternalIds>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub publication_year: Option<i32>,

    /// ISO 8601 date
    #[serde(default)]
    pub publication_date: Option<String>,

    #[serde(default)]
    pub primary_location: Option<Location>,

    #[serde(default)]
    pub open_access: Option<OpenAccess>,

    #[serde(default)]
    pub cited_by_count: Option<i32>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub sustainable_development_goals: Vec<Option<Goal>>,

    /// article, preprint, book-chapter, ...
    #[serde(rename = "type", default)]
    pub work_type: Option<String>,

    #[serde(default)]
    pub primary_topic: Option<Topic>,

    #[serde(default)]
    pub created_date: Option<String>,

    #[serde(default)]
    pub updated_date: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub authorships: Vec<Option<Authorship>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub source: Option<Source>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Source {
    /// Journal or repository name
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub host_organization_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAccess {
    #[serde(default)]
    pub is_oa: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Goal {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Authorship {
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub raw_author_name: Option<String>,
    /// first, middle, last
    #[serde(default)]
    pub author_position: Option<String>,
    #[serde(default)]
    pub is_corresponding: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub institutions: Vec<Option<Institution>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Institution {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

impl Work {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// DOI, preferring `ids.doi`
    pub fn doi(&self) -> Option<&str> {
        self.ids
            .as_ref()
            .and_then(|ids| ids.doi.as_deref())
            .or(self.doi.as_deref())
    }

    fn source(&self) -> Option<&Source> {
        self.primary_location.as_ref()?.source.as_ref()
    }

    pub fn publisher(&self) -> Option<&str> {
        self.source()?.host_organization_name.as_deref()
    }

    pub fn journal(&self) -> Option<&str> {
        self.source()?.display_name.as_deref()
    }

    /// First sustainability goal tag; later tags are dropped
    pub fn first_goal(&self) -> Option<&str> {
        self.sustainable_development_goals
            .iter()
            .flatten()
            .find_map(|g| g.display_name.as_deref())
    }

    pub fn topic(&self) -> Option<&str> {
        self.primary_topic.as_ref()?.display_name.as_deref()
    }

    pub fn is_oa(&self) -> bool {
        self.open_access
            .as_ref()
            .and_then(|oa| oa.is_oa)
            .unwrap_or(false)
    }

    /// Parsed publication date; unparseable values become `None`
    pub fn publication_date(&self) -> Option<NaiveDate> {
        let raw = self.publication_date.as_deref()?;
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                log::debug!("{}: unparseable publication_date {raw:?}", self.short_id());
                None
            }
        }
    }

    /// Authorships that carry an author object, in input order
    pub fn authorships(&self) -> impl Iterator<Item = (&Authorship, &Author)> {
        self.authorships
            .iter()
            .flatten()
            .filter_map(|a| a.author.as_ref().map(|author| (a, author)))
    }

    /// Number of flat rows this work expands to
    pub fn fan_out(&self) -> usize {
        self.authorships()
            .map(|(a, _)| a.institutions().count().max(1))
            .sum()
    }
}

impl Authorship {
    /// Non-null institutions, in input order
    pub fn institutions(&self) -> impl Iterator<Item = &Institution> {
        self.institutions.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_WORK: &str = r#"{
        "id": "https://openalex.org/W2741809807",
        "doi": "https://doi.org/10.1038/top-level",
        "ids": {"openalex": "https://openalex.org/W2741809807", "doi": "https://doi.org/10.1038/s41586-018-0102-6"},
        "title": "Sample Title",
        "display_name": "Sample Title",
        "publication_year": 2025,
        "publication_date": "2025-01-15",
        "primary_location": {"source": {"display_name": "Nature", "host_organization_name": "Springer Nature"}},
        "open_access": {"is_oa": true, "oa_status": "gold"},
        "cited_by_count": 42,
        "sustainable_development_goals": [
            {"id": "https://metadata.un.org/sdg/3", "display_name": "Good health and well-being", "score": 0.6},
            {"id": "https://metadata.un.org/sdg/4", "display_name": "Quality Education", "score": 0.4}
        ],
        "type": "article",
        "primary_topic": {"id": "https://openalex.org/T789", "display_name": "Machine Learning"},
        "created_date": "2020-01-01",
        "updated_date": "2025-01-15T04:12:33.123456",
        "authorships": [
            {
                "author_position": "first",
                "author": {"id": "https://openalex.org/A1", "display_name": "Ada", "orcid": "https://orcid.org/0000-0001"},
                "institutions": [
                    {"id": "https://openalex.org/I1", "display_name": "Uni One", "country_code": "NL"},
                    {"id": "https://openalex.org/I2", "display_name": "Uni Two", "country_code": "DE"}
                ],
                "is_corresponding": true,
                "raw_author_name": "A. Lovelace"
            },
            null,
            {"author": null, "institutions": []},
            {"author": {"id": "https://openalex.org/A2"}, "institutions": null}
        ]
    }"#;

    fn sample() -> Work {
        serde_json::from_str(SAMPLE_WORK).unwrap()
    }

    #[test]
    fn parse_work() {
        let work = sample();
        assert_eq!(work.short_id(), "W2741809807");
        assert_eq!(work.publication_year, Some(2025));
        assert_eq!(work.cited_by_count, Some(42));
        assert_eq!(work.work_type.as_deref(), Some("article"));
        assert_eq!(work.authorships.len(), 4);
    }

    #[test]
    fn doi_prefers_ids() {
        assert_eq!(sample().doi(), Some("https://doi.org/10.1038/s41586-018-0102-6"));
        let work: Work =
            serde_json::from_str(r#"{"id": "W1", "doi": "https://doi.org/10.1/x"}"#).unwrap();
        assert_eq!(work.doi(), Some("https://doi.org/10.1/x"));
    }

    #[test]
    fn source_fields() {
        let work = sample();
        assert_eq!(work.publisher(), Some("Springer Nature"));
        assert_eq!(work.journal(), Some("Nature"));
    }

    #[test]
    fn first_goal_only() {
        assert_eq!(sample().first_goal(), Some("Good health and well-being"));
    }

    #[test]
    fn date_parsing() {
        let work = sample();
        assert_eq!(work.publication_date(), NaiveDate::from_ymd_opt(2025, 1, 15));
        let bad: Work =
            serde_json::from_str(r#"{"id": "W1", "publication_date": "2025"}"#).unwrap();
        assert_eq!(bad.publication_date(), None);
    }

    #[test]
    fn null_entries_skipped() {
        let work = sample();
        let authors: Vec<_> = work
            .authorships()
            .map(|(_, a)| a.id.as_deref().unwrap())
            .collect();
        assert_eq!(authors, vec!["https://openalex.org/A1", "https://openalex.org/A2"]);
        // 2 institutions + 1 placeholder row
        assert_eq!(work.fan_out(), 3);
    }

    #[test]
    fn minimal_work() {
        let work: Work = serde_json::from_str(r#"{"id": "https://openalex.org/W1"}"#).unwrap();
        assert_eq!(work.short_id(), "W1");
        assert!(work.doi().is_none());
        assert!(work.publisher().is_none());
        assert!(work.first_goal().is_none());
        assert!(!work.is_oa());
        assert_eq!(work.fan_out(), 0);
    }

    #[test]
    fn null_arrays_accepted() {
        let json = r#"{"id": "W1", "authorships": null, "sustainable_development_goals": null}"#;
        let work: Work = serde_json::from_str(json).unwrap();
        assert!(work.authorships.is_empty());
        assert!(work.sustainable_development_goals.is_empty());
    }

    #[test]
    fn missing_id_rejected() {
        assert!(serde_json::from_str::<Work>(r#"{"title": "no id"}"#).is_err());
        assert!(sonic_rs::from_str::<Work>(r#"{"id": null}"#).is_err());
    }

    #[test]
    fn sonic_matches_serde_json() {
        let work: Work = sonic_rs::from_str(SAMPLE_WORK).unwrap();
        assert_eq!(work.fan_out(), sample().fan_out());
        assert_eq!(work.doi(), sample().doi());
    }
}
