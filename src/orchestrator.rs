use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::dedup::{Deduplicator, Fingerprint};
use crate::error::FetchError;
use crate::fetchers::Fetcher;
use crate::limiter::SourceRateLimiter;
use crate::metrics::Metrics;
use crate::models::{JobListing, RunStatistics, SearchTask};
use crate::normalize;

/// Everything a completed run hands to the exporter.
#[derive(Debug)]
pub struct RunReport {
    pub listings: Vec<JobListing>,
    pub stats: RunStatistics,
}

impl RunReport {
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.stats.run_id,
            fetched = self.stats.total_fetched(),
            accepted = self.stats.total_accepted(),
            duplicates = self.stats.total_duplicates(),
            errors = self.stats.total_errors(),
            elapsed_secs = format!("{:.2}", self.stats.elapsed_seconds()),
            "Run completed"
        );
        for (source, stats) in &self.stats.per_source {
            tracing::info!(
                %source,
                fetched = stats.fetched,
                accepted = stats.accepted,
                duplicates = stats.duplicates,
                errors = stats.errors,
                "Source results"
            );
        }
    }
}

/// Drives one run: iterates sources in configured order, keywords and
/// locations within each, funnels every fetched listing through the
/// normalizer and the deduplicator, and tallies statistics. Task-level
/// fetch failures are recorded and skipped; only invalid configuration
/// or a browser that cannot start at all aborts the run.
pub struct Orchestrator {
    fetchers: Vec<Box<dyn Fetcher>>,
    limiter: Arc<SourceRateLimiter>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        fetchers: Vec<Box<dyn Fetcher>>,
        limiter: Arc<SourceRateLimiter>,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetchers,
            limiter,
            metrics,
            cancel,
        }
    }

    /// Expand configuration into the task list, in source order then
    /// keyword then location order.
    pub fn generate_tasks(&self, config: &RunConfig) -> Vec<SearchTask> {
        let max = config.max_jobs_per_platform.max(0) as usize;
        let mut tasks = Vec::new();
        for fetcher in &self.fetchers {
            for keyword in &config.keywords {
                for location in &config.locations {
                    tasks.push(SearchTask::new(fetcher.source(), keyword, location, max));
                }
            }
        }
        tasks
    }

    pub async fn run(
        &self,
        config: &RunConfig,
        seen: Vec<Fingerprint>,
    ) -> anyhow::Result<RunReport> {
        config.validate()?;

        let mut stats = RunStatistics::new();
        let mut dedup = Deduplicator::new();
        let preloaded = seen.len();
        dedup.preload(seen);
        if preloaded > 0 {
            tracing::info!(preloaded, "Suppressing listings seen in a prior run");
        }

        let mut listings = Vec::new();
        tracing::info!(run_id = %stats.run_id, sources = self.fetchers.len(), "Run started");

        'sources: for fetcher in &self.fetchers {
            let source = fetcher.source();
            for keyword in &config.keywords {
                for location in &config.locations {
                    if self.cancel.is_cancelled() {
                        tracing::warn!("Cancellation requested, stopping before next task");
                        break 'sources;
                    }

                    let task = SearchTask::new(
                        source,
                        keyword,
                        location,
                        config.max_jobs_per_platform as usize,
                    );
                    self.limiter.acquire(source).await;
                    self.run_task(fetcher.as_ref(), &task, &mut dedup, &mut stats, &mut listings)
                        .await?;
                }
            }
        }

        stats.finish();
        Ok(RunReport { listings, stats })
    }

    async fn run_task(
        &self,
        fetcher: &dyn Fetcher,
        task: &SearchTask,
        dedup: &mut Deduplicator,
        stats: &mut RunStatistics,
        listings: &mut Vec<JobListing>,
    ) -> anyhow::Result<()> {
        let source = task.source;
        tracing::info!(task = %task, "Task started");

        let raws = match fetcher.fetch(task).await {
            Ok(raws) => raws,
            Err(FetchError::SessionUnavailable(msg)) => {
                // Without a browser session every remaining browser task
                // would fail the same way; this aborts the run.
                anyhow::bail!("cannot start a browser session: {msg}");
            }
            Err(e) => {
                tracing::error!(task = %task, error = %e, "Task failed");
                stats.source_mut(source).errors += 1;
                self.metrics.source(source).errors.fetch_add(1, Ordering::Relaxed);
                self.metrics.tasks_failed.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        };

        let fetched = raws.len() as u64;
        stats.source_mut(source).fetched += fetched;
        self.metrics
            .source(source)
            .fetched
            .fetch_add(fetched, Ordering::Relaxed);

        for raw in &raws {
            let listing = match normalize::normalize(raw, Utc::now()) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::debug!(task = %task, error = %e, "Skipping malformed listing");
                    continue;
                }
            };

            if dedup.admit(&listing) {
                stats.source_mut(source).accepted += 1;
                self.metrics
                    .source(source)
                    .accepted
                    .fetch_add(1, Ordering::Relaxed);
                listings.push(listing);
            } else {
                tracing::debug!(
                    task = %task,
                    title = %listing.title,
                    fingerprint = %Fingerprint::of(&listing).to_hex(),
                    "Duplicate listing rejected"
                );
                stats.source_mut(source).duplicates += 1;
                self.metrics
                    .source(source)
                    .duplicates
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        self.metrics.tasks_completed.fetch_add(1, Ordering::Relaxed);
        tracing::info!(task = %task, fetched, "Task completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::models::{RawListing, Source};

    fn test_config(indeed: bool, jsearch: bool) -> RunConfig {
        RunConfig {
            keywords: vec!["python developer".into()],
            locations: vec!["Remote".into()],
            max_jobs_per_platform: 10,
            indeed_enabled: indeed,
            jsearch_enabled: jsearch,
            jsearch_api_key: "key".into(),
            headless: true,
            output_dir: PathBuf::from("output"),
            min_interval: Duration::from_millis(1),
            jitter: Duration::ZERO,
            max_retries: 2,
            timeout: Duration::from_secs(1),
            seen_file: None,
        }
    }

    struct StubFetcher {
        source: Source,
        responses: Mutex<Vec<Result<Vec<RawListing>, FetchError>>>,
    }

    impl StubFetcher {
        fn new(source: Source, responses: Vec<Result<Vec<RawListing>, FetchError>>) -> Self {
            Self {
                source,
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        fn source(&self) -> Source {
            self.source
        }

        async fn fetch(&self, _task: &SearchTask) -> Result<Vec<RawListing>, FetchError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    fn raw(source: Source, title: &str, company: &str, url: &str) -> RawListing {
        RawListing {
            source: Some(source),
            title: Some(title.into()),
            company: Some(company.into()),
            location: Some("Remote".into()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    fn orchestrator(fetchers: Vec<Box<dyn Fetcher>>) -> Orchestrator {
        Orchestrator::new(
            fetchers,
            Arc::new(SourceRateLimiter::new(
                Duration::from_millis(1),
                Duration::ZERO,
            )),
            Arc::new(Metrics::new()),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn single_enabled_platform_issues_one_task() {
        let stub = StubFetcher::new(Source::Indeed, vec![Ok(vec![])]);
        let orch = orchestrator(vec![Box::new(stub)]);
        let config = test_config(true, false);

        assert_eq!(orch.generate_tasks(&config).len(), 1);

        let report = orch.run(&config, Vec::new()).await.unwrap();
        assert!(report.listings.is_empty());
        assert_eq!(report.stats.total_fetched(), 0);
        assert_eq!(report.stats.total_duplicates(), 0);
    }

    #[tokio::test]
    async fn cross_source_duplicate_keeps_first_seen() {
        let indeed = StubFetcher::new(
            Source::Indeed,
            vec![Ok(vec![raw(
                Source::Indeed,
                "Rust Engineer",
                "Acme",
                "https://indeed.example/1",
            )])],
        );
        let jsearch = StubFetcher::new(
            Source::JSearch,
            vec![Ok(vec![raw(
                Source::JSearch,
                "Rust Engineer",
                "Acme",
                "https://jsearch.example/2",
            )])],
        );

        let orch = orchestrator(vec![Box::new(indeed), Box::new(jsearch)]);
        let report = orch.run(&test_config(true, true), Vec::new()).await.unwrap();

        assert_eq!(report.listings.len(), 1);
        assert_eq!(report.listings[0].source, Source::Indeed);
        assert_eq!(report.stats.total_duplicates(), 1);
        assert_eq!(report.stats.total_fetched(), 2);
    }

    #[tokio::test]
    async fn task_failure_is_recorded_and_run_continues() {
        let failing = StubFetcher::new(
            Source::Indeed,
            vec![Err(FetchError::RetriesExhausted {
                attempts: 3,
                last: "timeout".into(),
            })],
        );
        let healthy = StubFetcher::new(
            Source::JSearch,
            vec![Ok(vec![raw(
                Source::JSearch,
                "Data Engineer",
                "Globex",
                "https://jsearch.example/3",
            )])],
        );

        let orch = orchestrator(vec![Box::new(failing), Box::new(healthy)]);
        let report = orch.run(&test_config(true, true), Vec::new()).await.unwrap();

        assert_eq!(report.stats.per_source[&Source::Indeed].errors, 1);
        assert_eq!(report.listings.len(), 1);
        assert!(report.stats.finished_at.is_some());
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_not_fatal() {
        let mut bad = raw(Source::Indeed, "", "Acme", "https://indeed.example/1");
        bad.title = None;
        let good = raw(Source::Indeed, "Dev", "Acme", "https://indeed.example/2");

        let stub = StubFetcher::new(Source::Indeed, vec![Ok(vec![bad, good])]);
        let orch = orchestrator(vec![Box::new(stub)]);
        let report = orch.run(&test_config(true, false), Vec::new()).await.unwrap();

        assert_eq!(report.stats.total_fetched(), 2);
        assert_eq!(report.listings.len(), 1);
        assert_eq!(report.stats.total_errors(), 0);
    }

    #[tokio::test]
    async fn invalid_configuration_aborts_before_any_task() {
        let stub = StubFetcher::new(Source::Indeed, vec![Ok(vec![])]);
        let orch = orchestrator(vec![Box::new(stub)]);
        let mut config = test_config(true, false);
        config.keywords.clear();

        let result = orch.run(&config, Vec::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn session_launch_failure_aborts_run() {
        let stub = StubFetcher::new(
            Source::Indeed,
            vec![Err(FetchError::SessionUnavailable("no chrome".into()))],
        );
        let orch = orchestrator(vec![Box::new(stub)]);

        let result = orch.run(&test_config(true, false), Vec::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn preloaded_fingerprints_count_as_duplicates() {
        let listing_raw = raw(Source::Indeed, "Dev", "Acme", "https://indeed.example/1");
        let stub = StubFetcher::new(Source::Indeed, vec![Ok(vec![listing_raw])]);
        let orch = orchestrator(vec![Box::new(stub)]);

        let seen = vec![Fingerprint::from_fields("Dev", "Acme", "Remote")];
        let report = orch.run(&test_config(true, false), seen).await.unwrap();

        assert!(report.listings.is_empty());
        assert_eq!(report.stats.total_duplicates(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_issuing_tasks() {
        let stub = StubFetcher::new(Source::Indeed, vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orch = Orchestrator::new(
            vec![Box::new(stub)],
            Arc::new(SourceRateLimiter::new(
                Duration::from_millis(1),
                Duration::ZERO,
            )),
            Arc::new(Metrics::new()),
            cancel,
        );

        let report = orch.run(&test_config(true, false), Vec::new()).await.unwrap();
        assert_eq!(report.stats.total_fetched(), 0);
        assert!(report.listings.is_empty());
    }
}
