use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// External origin of job listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Indeed,
    JSearch,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Indeed => "indeed",
            Source::JSearch => "jsearch",
        }
    }

    pub const ALL: [Source; 2] = [Source::Indeed, Source::JSearch];
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-specific capture of one listing before normalization.
/// Fetchers fill in whatever the source exposed; the normalizer decides
/// what is usable.
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub source: Option<Source>,
    pub source_id: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub salary_text: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub snippet: Option<String>,
    pub posted_at: Option<String>,
    pub employment_type: Option<String>,
    pub is_remote: Option<bool>,
    pub raw_data: Option<serde_json::Value>,
}

/// Canonical job listing record, one CSV row per accepted listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub source: Source,
    pub source_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub remote_type: Option<String>,
    pub description_snippet: Option<String>,
    pub posted_date: Option<NaiveDate>,
    pub fetched_at: DateTime<Utc>,
}
