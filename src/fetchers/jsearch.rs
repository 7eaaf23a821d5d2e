use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::fetchers::{Fetcher, RetryPolicy};
use crate::limiter::SourceRateLimiter;
use crate::models::{RawListing, SearchTask, Source};

const API_URL: &str = "https://jsearch.p.rapidapi.com/search";
const API_HOST: &str = "jsearch.p.rapidapi.com";
/// JSearch returns roughly this many results per page; a shorter page
/// means the result set is exhausted.
const PAGE_SIZE: usize = 10;

/// API-driven fetcher for the JSearch aggregator on RapidAPI. Covers
/// LinkedIn, Glassdoor, Indeed, ZipRecruiter and Google Jobs postings
/// behind one JSON endpoint.
pub struct JSearchFetcher {
    client: reqwest::Client,
    api_key: String,
    limiter: Arc<SourceRateLimiter>,
    retry: RetryPolicy,
}

impl JSearchFetcher {
    pub fn new(
        api_key: String,
        timeout: Duration,
        limiter: Arc<SourceRateLimiter>,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("jobharvest/0.1")
            .build()?;
        Ok(Self {
            client,
            api_key,
            limiter,
            retry,
        })
    }

    async fn fetch_page(&self, task: &SearchTask, page: u32) -> Result<Value, FetchError> {
        let query = format!("{} in {}", task.keyword, task.location);
        let response = self
            .client
            .get(API_URL)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", API_HOST)
            .query(&[
                ("query", query.as_str()),
                ("page", &page.to_string()),
                ("num_pages", "1"),
                ("date_posted", "all"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Fetcher for JSearchFetcher {
    fn source(&self) -> Source {
        Source::JSearch
    }

    async fn fetch(&self, task: &SearchTask) -> Result<Vec<RawListing>, FetchError> {
        let mut listings = Vec::new();
        let mut page: u32 = 1;

        while listings.len() < task.max_results {
            if page > 1 {
                self.limiter.acquire(self.source()).await;
            }

            let label = format!("jsearch page {page} for \"{}\"", task.keyword);
            let data = self
                .retry
                .run(&label, || self.fetch_page(task, page))
                .await?;

            let results = match data.get("data").and_then(|v| v.as_array()) {
                Some(results) if !results.is_empty() => results.clone(),
                _ => {
                    tracing::debug!(task = %task, page, "No more results");
                    break;
                }
            };

            let page_len = results.len();
            for raw in &results {
                if listings.len() >= task.max_results {
                    break;
                }
                listings.push(parse_job(raw));
            }

            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(listings)
    }
}

/// Map one JSearch result object into a raw capture. Field extraction is
/// defensive: the API omits fields freely, and the normalizer decides
/// what is usable downstream.
fn parse_job(raw: &Value) -> RawListing {
    let text = |key: &str| raw.get(key).and_then(|v| v.as_str()).map(String::from);

    let location = {
        let parts: Vec<String> = ["job_city", "job_state", "job_country"]
            .iter()
            .filter_map(|key| text(key))
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    };

    let url = text("job_apply_link").or_else(|| text("job_google_link"));

    RawListing {
        source: Some(Source::JSearch),
        source_id: text("job_id"),
        title: text("job_title"),
        company: text("employer_name"),
        location,
        url,
        salary_text: None,
        salary_min: raw.get("job_min_salary").and_then(|v| v.as_f64()),
        salary_max: raw.get("job_max_salary").and_then(|v| v.as_f64()),
        salary_currency: text("job_salary_currency"),
        snippet: text("job_description"),
        posted_at: text("job_posted_at_datetime_utc"),
        employment_type: text("job_employment_type"),
        is_remote: raw.get("job_is_remote").and_then(|v| v.as_bool()),
        raw_data: Some(raw.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_api_result() {
        let raw = json!({
            "job_id": "xyz789",
            "job_title": "Python Developer",
            "employer_name": "Initech",
            "job_city": "Austin",
            "job_state": "TX",
            "job_country": "US",
            "job_apply_link": "https://example.com/apply",
            "job_min_salary": 95000.0,
            "job_max_salary": 120000.0,
            "job_salary_currency": "USD",
            "job_employment_type": "FULLTIME",
            "job_is_remote": true,
            "job_posted_at_datetime_utc": "2024-04-30T12:30:00Z",
            "job_description": "Write Python."
        });

        let listing = parse_job(&raw);
        assert_eq!(listing.source, Some(Source::JSearch));
        assert_eq!(listing.title.as_deref(), Some("Python Developer"));
        assert_eq!(listing.location.as_deref(), Some("Austin, TX, US"));
        assert_eq!(listing.salary_min, Some(95000.0));
        assert_eq!(listing.is_remote, Some(true));
    }

    #[test]
    fn falls_back_to_google_link_and_tolerates_gaps() {
        let raw = json!({
            "job_id": "sparse",
            "job_title": "Data Engineer",
            "job_google_link": "https://google.com/jobs/1"
        });

        let listing = parse_job(&raw);
        assert_eq!(listing.url.as_deref(), Some("https://google.com/jobs/1"));
        assert_eq!(listing.location, None);
        assert_eq!(listing.company, None);
    }
}
