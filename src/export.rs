use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dedup::Fingerprint;
use crate::error::ExportError;
use crate::models::{JobListing, RunStatistics};
use crate::orchestrator::RunReport;

/// One row of the per-run statistics file.
#[derive(Debug, Serialize)]
struct StatsRow<'a> {
    run_id: String,
    source: &'a str,
    fetched: u64,
    accepted: u64,
    duplicates: u64,
    errors: u64,
    started_at: String,
    finished_at: String,
    elapsed_seconds: String,
}

/// Writes run output as timestamped CSV files in the output directory.
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Persist the accepted listings and the statistics of one run.
    /// Returns the path of the jobs file, or None when the run accepted
    /// nothing.
    pub fn export(&self, report: &RunReport) -> Result<Option<PathBuf>, ExportError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let timestamp = report.stats.started_at;

        self.write_stats(&report.stats, timestamp)?;

        if report.listings.is_empty() {
            tracing::warn!("No listings to export");
            return Ok(None);
        }

        let path = self.timestamped_path("jobs", timestamp);
        let mut writer = csv::Writer::from_path(&path)?;
        for listing in &report.listings {
            writer.serialize(listing)?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), rows = report.listings.len(), "Exported listings");
        Ok(Some(path))
    }

    fn write_stats(
        &self,
        stats: &RunStatistics,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ExportError> {
        let path = self.timestamped_path("run_stats", timestamp);
        let mut writer = csv::Writer::from_path(&path)?;

        let finished = stats
            .finished_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        for (source, counters) in &stats.per_source {
            writer.serialize(StatsRow {
                run_id: stats.run_id.to_string(),
                source: source.as_str(),
                fetched: counters.fetched,
                accepted: counters.accepted,
                duplicates: counters.duplicates,
                errors: counters.errors,
                started_at: stats.started_at.to_rfc3339(),
                finished_at: finished.clone(),
                elapsed_seconds: format!("{:.2}", stats.elapsed_seconds()),
            })?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), "Exported run statistics");
        Ok(())
    }

    fn timestamped_path(&self, prefix: &str, timestamp: DateTime<Utc>) -> PathBuf {
        self.output_dir
            .join(format!("{prefix}_{}.csv", timestamp.format("%Y%m%d_%H%M%S")))
    }
}

/// Recompute fingerprints from a prior export so its listings can be
/// suppressed this run.
pub fn load_fingerprints(path: &Path) -> Result<Vec<Fingerprint>, ExportError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut fingerprints = Vec::new();
    for record in reader.deserialize::<JobListing>() {
        match record {
            Ok(listing) => fingerprints.push(Fingerprint::of(&listing)),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable row in seen file"),
        }
    }
    Ok(fingerprints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use chrono::Utc;

    fn listing(title: &str) -> JobListing {
        JobListing {
            source: Source::Indeed,
            source_id: Some("abc".into()),
            title: title.to_string(),
            company: "Acme".into(),
            location: "Remote".into(),
            url: "https://www.indeed.com/viewjob?jk=abc".into(),
            salary_min: Some(70_000.0),
            salary_max: Some(90_000.0),
            salary_currency: Some("USD".into()),
            salary_period: Some("yearly".into()),
            job_type: Some("full-time".into()),
            experience_level: Some("mid".into()),
            remote_type: Some("remote".into()),
            description_snippet: Some("Build things.".into()),
            posted_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 1),
            fetched_at: Utc::now(),
        }
    }

    fn report(listings: Vec<JobListing>) -> RunReport {
        let mut stats = RunStatistics::new();
        stats.source_mut(Source::Indeed).fetched = listings.len() as u64;
        stats.source_mut(Source::Indeed).accepted = listings.len() as u64;
        stats.finish();
        RunReport { listings, stats }
    }

    #[test]
    fn exports_jobs_and_stats_files() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());

        let path = exporter
            .export(&report(vec![listing("Rust Engineer"), listing("Python Dev")]))
            .unwrap()
            .expect("jobs file written");

        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("jobs_"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("Rust Engineer"));
        assert!(body.contains("indeed"));

        let stats_exists = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_str().unwrap().starts_with("run_stats_"));
        assert!(stats_exists);
    }

    #[test]
    fn empty_run_writes_stats_only() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        assert!(exporter.export(&report(Vec::new())).unwrap().is_none());
    }

    #[test]
    fn exported_file_round_trips_into_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CsvExporter::new(dir.path());
        let exported = listing("Rust Engineer");
        let path = exporter
            .export(&report(vec![exported.clone()]))
            .unwrap()
            .unwrap();

        let fingerprints = load_fingerprints(&path).unwrap();
        assert_eq!(fingerprints.len(), 1);
        assert_eq!(fingerprints[0], Fingerprint::of(&exported));
    }
}
