use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use scraper::{ElementRef, Html, Selector};

use crate::error::FetchError;
use crate::fetchers::{Fetcher, RetryPolicy};
use crate::limiter::SourceRateLimiter;
use crate::models::{RawListing, SearchTask, Source};

const BASE_URL: &str = "https://www.indeed.com";
/// Indeed advances result pages in steps of 10.
const PAGE_STEP: usize = 10;

/// RFC 3986 unreserved characters stay literal in query values.
const QUERY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static CARD: LazyLock<Selector> = LazyLock::new(|| sel("div.job_seen_beacon"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("h2.jobTitle span"));
static COMPANY: LazyLock<Selector> = LazyLock::new(|| sel("span[data-testid='company-name']"));
static LOCATION: LazyLock<Selector> = LazyLock::new(|| sel("div[data-testid='text-location']"));
static SALARY: LazyLock<Selector> =
    LazyLock::new(|| sel("div[data-testid='attribute_snippet_testid']"));
static SNIPPET: LazyLock<Selector> = LazyLock::new(|| sel("div.job-snippet"));
static JOB_LINK: LazyLock<Selector> = LazyLock::new(|| sel("a[data-jk]"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Browser-driven fetcher for Indeed search results. Each fetch call owns
/// one Chrome session: launched up front, reused across result pages, and
/// torn down on every exit path (dropping the handle kills the child
/// process). Card extraction happens on the rendered page HTML.
pub struct IndeedFetcher {
    headless: bool,
    timeout: Duration,
    limiter: Arc<SourceRateLimiter>,
    retry: RetryPolicy,
}

impl IndeedFetcher {
    pub fn new(
        headless: bool,
        timeout: Duration,
        limiter: Arc<SourceRateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            headless,
            timeout,
            limiter,
            retry,
        }
    }

    async fn launch(&self) -> Result<Browser, FetchError> {
        let headless = self.headless;
        tokio::task::spawn_blocking(move || {
            Browser::new(LaunchOptions {
                headless,
                ..Default::default()
            })
            .map_err(|e| FetchError::SessionUnavailable(e.to_string()))
        })
        .await
        .map_err(|e| FetchError::SessionUnavailable(format!("launch task failed: {e}")))?
    }

    async fn scrape_page(
        &self,
        browser: &Browser,
        url: &str,
        fallback_location: &str,
    ) -> Result<Vec<RawListing>, FetchError> {
        let browser = browser.clone();
        let url = url.to_string();
        let fallback = fallback_location.to_string();
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || scrape_page_blocking(&browser, &url, &fallback, timeout))
            .await
            .map_err(|e| FetchError::Browser(format!("scrape task failed: {e}")))?
    }
}

#[async_trait]
impl Fetcher for IndeedFetcher {
    fn source(&self) -> Source {
        Source::Indeed
    }

    async fn fetch(&self, task: &SearchTask) -> Result<Vec<RawListing>, FetchError> {
        let browser = self.launch().await?;
        let mut listings = Vec::new();
        let mut page = 0usize;

        while listings.len() < task.max_results {
            if page > 0 {
                self.limiter.acquire(self.source()).await;
            }

            let url = build_search_url(&task.keyword, &task.location, page * PAGE_STEP);
            let label = format!("indeed page {page} for \"{}\"", task.keyword);
            tracing::debug!(%url, "Loading search results page");

            let cards = self
                .retry
                .run(&label, || self.scrape_page(&browser, &url, &task.location))
                .await?;

            if cards.is_empty() {
                tracing::debug!(task = %task, page, "No more job cards");
                break;
            }

            for card in cards {
                if listings.len() >= task.max_results {
                    break;
                }
                listings.push(card);
            }
            page += 1;
        }

        Ok(listings)
    }
}

pub fn build_search_url(keyword: &str, location: &str, start: usize) -> String {
    format!(
        "{BASE_URL}/jobs?q={}&l={}&start={start}",
        utf8_percent_encode(keyword, QUERY_SET),
        utf8_percent_encode(location, QUERY_SET)
    )
}

/// Navigate a fresh tab to the search URL, wait for cards to render, and
/// extract them from the page HTML. The tab is closed before returning
/// on both the success and the error path.
fn scrape_page_blocking(
    browser: &Browser,
    url: &str,
    fallback_location: &str,
    timeout: Duration,
) -> Result<Vec<RawListing>, FetchError> {
    let tab = browser
        .new_tab()
        .map_err(|e| FetchError::Browser(e.to_string()))?;
    tab.set_default_timeout(timeout);

    let result = (|| -> Result<Vec<RawListing>, FetchError> {
        tab.navigate_to(url)
            .map_err(|e| classify_browser_error(&e))?;
        tab.wait_until_navigated()
            .map_err(|e| classify_browser_error(&e))?;

        // A results page with no matches never renders a card, so a wait
        // timeout here is not an error; the parse below settles it.
        if let Err(e) = tab.wait_for_element_with_custom_timeout("div.job_seen_beacon", timeout) {
            tracing::debug!(error = %e, "No job card appeared before timeout");
        }

        let html = tab
            .get_content()
            .map_err(|e| classify_browser_error(&e))?;
        Ok(parse_cards(&html, fallback_location))
    })();

    let _ = tab.close(true);
    result
}

fn classify_browser_error(e: &anyhow::Error) -> FetchError {
    let message = e.to_string();
    if message.to_lowercase().contains("timeout") || message.contains("Timed out") {
        FetchError::Timeout(message)
    } else {
        FetchError::Browser(message)
    }
}

/// Pull job cards out of a rendered search results page. Missing fields
/// on individual cards are tolerated; the normalizer rejects cards that
/// lack the required ones.
pub fn parse_cards(html: &str, fallback_location: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let mut cards = Vec::new();

    for card in document.select(&CARD) {
        let job_id = card
            .value()
            .attr("data-jk")
            .map(String::from)
            .or_else(|| {
                card.select(&JOB_LINK)
                    .next()
                    .and_then(|a| a.value().attr("data-jk"))
                    .map(String::from)
            });

        let url = job_id
            .as_deref()
            .map(|jk| format!("{BASE_URL}/viewjob?jk={jk}"));

        let location = select_text(&card, &LOCATION)
            .or_else(|| Some(fallback_location.to_string()))
            .filter(|s| !s.is_empty());

        cards.push(RawListing {
            source: Some(Source::Indeed),
            source_id: job_id,
            title: select_text(&card, &TITLE),
            company: select_text(&card, &COMPANY),
            location,
            url,
            salary_text: select_text(&card, &SALARY),
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            snippet: select_text(&card, &SNIPPET),
            posted_at: None,
            employment_type: None,
            is_remote: None,
            raw_data: None,
        });
    }

    cards
}

fn select_text(card: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector).next().map(|el| {
        el.text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
    .filter(|s| !s.is_empty())
}
