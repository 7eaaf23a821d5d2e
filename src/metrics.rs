use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::models::Source;

#[derive(Debug, Default)]
pub struct SourceCounters {
    pub fetched: AtomicU64,
    pub accepted: AtomicU64,
    pub duplicates: AtomicU64,
    pub errors: AtomicU64,
}

/// Run counters shared between the orchestrator (writer) and the
/// read-only HTTP endpoint. Atomics because the listener reads while a
/// run is in flight.
#[derive(Debug)]
pub struct Metrics {
    per_source: BTreeMap<Source, SourceCounters>,
    pub tasks_completed: AtomicU64,
    pub tasks_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            per_source: Source::ALL
                .iter()
                .map(|&s| (s, SourceCounters::default()))
                .collect(),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
        }
    }

    pub fn source(&self, source: Source) -> &SourceCounters {
        &self.per_source[&source]
    }

    /// Prometheus text exposition of all counters.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let gauges: [(&str, &str, fn(&SourceCounters) -> u64); 4] = [
            ("jobharvest_fetched_total", "Raw listings fetched", |c| {
                c.fetched.load(Ordering::Relaxed)
            }),
            ("jobharvest_accepted_total", "Listings accepted after dedup", |c| {
                c.accepted.load(Ordering::Relaxed)
            }),
            ("jobharvest_duplicates_total", "Listings rejected as duplicates", |c| {
                c.duplicates.load(Ordering::Relaxed)
            }),
            ("jobharvest_errors_total", "Task errors recorded", |c| {
                c.errors.load(Ordering::Relaxed)
            }),
        ];

        for (name, help, load) in gauges {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            for (source, counters) in &self.per_source {
                let _ = writeln!(out, "{name}{{source=\"{source}\"}} {}", load(counters));
            }
        }

        let _ = writeln!(out, "# HELP jobharvest_tasks_completed_total Search tasks attempted");
        let _ = writeln!(out, "# TYPE jobharvest_tasks_completed_total counter");
        let _ = writeln!(
            out,
            "jobharvest_tasks_completed_total {}",
            self.tasks_completed.load(Ordering::Relaxed)
        );
        let _ = writeln!(out, "# HELP jobharvest_tasks_failed_total Search tasks that ended in a fetch error");
        let _ = writeln!(out, "# TYPE jobharvest_tasks_failed_total counter");
        let _ = writeln!(
            out,
            "jobharvest_tasks_failed_total {}",
            self.tasks_failed.load(Ordering::Relaxed)
        );
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (StatusCode::OK, metrics.render())
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the read-only metrics surface until the process exits.
pub async fn serve(addr: &str, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics listening on {addr}");
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}
