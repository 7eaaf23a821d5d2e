mod config;
mod dedup;
mod error;
mod export;
mod fetchers;
mod limiter;
mod metrics;
mod models;
mod normalize;
mod orchestrator;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, RunConfig};
use crate::export::CsvExporter;
use crate::fetchers::{Fetcher, IndeedFetcher, JSearchFetcher, RetryPolicy};
use crate::limiter::SourceRateLimiter;
use crate::metrics::Metrics;
use crate::orchestrator::Orchestrator;

/// Base delay for the first retry backoff step.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobharvest=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = RunConfig::load(&cli)?;

    let metrics = Arc::new(Metrics::new());
    if cli.serve_metrics {
        let metrics = metrics.clone();
        let addr = cli.metrics_addr.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(&addr, metrics).await {
                tracing::error!(error = %e, "Metrics listener failed");
            }
        });
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, finishing current task and shutting down");
                cancel.cancel();
            }
        });
    }

    let limiter = Arc::new(SourceRateLimiter::new(config.min_interval, config.jitter));
    let retry = RetryPolicy::new(config.max_retries, RETRY_BASE_DELAY);

    let mut fetchers: Vec<Box<dyn Fetcher>> = Vec::new();
    if config.indeed_enabled {
        fetchers.push(Box::new(IndeedFetcher::new(
            config.headless,
            config.timeout,
            limiter.clone(),
            retry,
        )));
        tracing::info!("Indeed browser fetcher enabled");
    }
    if config.jsearch_enabled {
        fetchers.push(Box::new(JSearchFetcher::new(
            config.jsearch_api_key.clone(),
            config.timeout,
            limiter.clone(),
            retry,
        )?));
        tracing::info!("JSearch API fetcher enabled");
    }

    let seen = match &config.seen_file {
        Some(path) => {
            let fingerprints = export::load_fingerprints(path)?;
            tracing::info!(path = %path.display(), count = fingerprints.len(), "Loaded seen file");
            fingerprints
        }
        None => Vec::new(),
    };

    let orchestrator = Orchestrator::new(fetchers, limiter, metrics, cancel.clone());
    let exporter = CsvExporter::new(&config.output_dir);

    loop {
        let report = orchestrator.run(&config, seen.clone()).await?;
        report.log_summary();
        exporter.export(&report)?;

        let Some(hours) = cli.every else { break };
        if cancel.is_cancelled() {
            break;
        }
        tracing::info!(hours, "Sleeping until next scheduled run");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(hours * 3600)) => {}
        }
    }

    Ok(())
}
