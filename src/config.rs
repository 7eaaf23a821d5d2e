use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobharvest", about = "Multi-source job listing aggregator")]
pub struct Cli {
    /// Path to a JSON config file; CLI flags override file values
    #[arg(long, env = "JOBHARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Search keyword (repeatable)
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Search location (repeatable)
    #[arg(long = "location")]
    pub locations: Vec<String>,

    /// Maximum listings to collect per platform
    #[arg(long)]
    pub max_jobs: Option<i64>,

    /// Enable or disable the Indeed browser scraper
    #[arg(long)]
    pub indeed: Option<bool>,

    /// Enable or disable the JSearch API fetcher
    #[arg(long)]
    pub jsearch: Option<bool>,

    /// RapidAPI key for JSearch
    #[arg(long, env = "JSEARCH_API_KEY")]
    pub jsearch_api_key: Option<String>,

    /// Run the browser headless
    #[arg(long)]
    pub headless: Option<bool>,

    /// Directory for CSV exports
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Minimum delay between requests to one source, in milliseconds
    #[arg(long)]
    pub min_interval_ms: Option<u64>,

    /// Random jitter added on top of the minimum delay, in milliseconds
    #[arg(long)]
    pub jitter_ms: Option<u64>,

    /// Retry attempts per task before recording a fetch failure
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-request / per-page-load timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Serve /metrics and /healthz while running
    #[arg(long, default_value = "false")]
    pub serve_metrics: bool,

    /// Metrics listen address
    #[arg(long, env = "METRICS_ADDR", default_value = "127.0.0.1:9187")]
    pub metrics_addr: String,

    /// Repeat the run every N hours instead of exiting
    #[arg(long)]
    pub every: Option<u64>,

    /// Prior export CSV whose listings are suppressed this run
    #[arg(long)]
    pub seen_file: Option<PathBuf>,
}

/// Shape of the optional JSON config file. All fields optional; missing
/// fields fall back to built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub search_keywords: Option<Vec<String>>,
    pub locations: Option<Vec<String>>,
    pub max_jobs_per_platform: Option<i64>,
    pub platforms: Option<Platforms>,
    pub jsearch_api_key: Option<String>,
    pub headless: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub min_interval_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Platforms {
    pub indeed: bool,
    pub jsearch: bool,
}

impl Default for Platforms {
    fn default() -> Self {
        Self {
            indeed: true,
            jsearch: false,
        }
    }
}

/// Effective run configuration after merging CLI flags over the config
/// file over defaults.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub max_jobs_per_platform: i64,
    pub indeed_enabled: bool,
    pub jsearch_enabled: bool,
    pub jsearch_api_key: String,
    pub headless: bool,
    pub output_dir: PathBuf,
    pub min_interval: Duration,
    pub jitter: Duration,
    pub max_retries: u32,
    pub timeout: Duration,
    pub seen_file: Option<PathBuf>,
}

impl RunConfig {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, &file))
    }

    fn merge(cli: &Cli, file: &FileConfig) -> Self {
        let platforms = file.platforms.clone().unwrap_or_default();
        let keywords = if cli.keywords.is_empty() {
            file.search_keywords.clone().unwrap_or_default()
        } else {
            cli.keywords.clone()
        };
        let locations = if cli.locations.is_empty() {
            file.locations.clone().unwrap_or_default()
        } else {
            cli.locations.clone()
        };

        Self {
            keywords,
            locations,
            max_jobs_per_platform: cli
                .max_jobs
                .or(file.max_jobs_per_platform)
                .unwrap_or(50),
            indeed_enabled: cli.indeed.unwrap_or(platforms.indeed),
            jsearch_enabled: cli.jsearch.unwrap_or(platforms.jsearch),
            jsearch_api_key: cli
                .jsearch_api_key
                .clone()
                .or_else(|| file.jsearch_api_key.clone())
                .unwrap_or_default(),
            headless: cli.headless.or(file.headless).unwrap_or(true),
            output_dir: cli
                .output_dir
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("output")),
            min_interval: Duration::from_millis(
                cli.min_interval_ms.or(file.min_interval_ms).unwrap_or(2000),
            ),
            jitter: Duration::from_millis(cli.jitter_ms.or(file.jitter_ms).unwrap_or(500)),
            max_retries: cli.max_retries.or(file.max_retries).unwrap_or(3),
            timeout: Duration::from_secs(cli.timeout_secs.or(file.timeout_secs).unwrap_or(30)),
            seen_file: cli.seen_file.clone(),
        }
    }

    /// Reject configurations that cannot produce a meaningful run.
    /// Called once before any task executes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.is_empty() {
            return Err(ConfigError::NoKeywords);
        }
        if self.locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }
        if self.max_jobs_per_platform <= 0 {
            return Err(ConfigError::InvalidMaxJobs(self.max_jobs_per_platform));
        }
        if !self.indeed_enabled && !self.jsearch_enabled {
            return Err(ConfigError::NoPlatformsEnabled);
        }
        if self.jsearch_enabled && self.jsearch_api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::ParseFile {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RunConfig {
        RunConfig {
            keywords: vec!["python developer".into()],
            locations: vec!["Remote".into()],
            max_jobs_per_platform: 10,
            indeed_enabled: true,
            jsearch_enabled: false,
            jsearch_api_key: String::new(),
            headless: true,
            output_dir: PathBuf::from("output"),
            min_interval: Duration::from_millis(2000),
            jitter: Duration::from_millis(500),
            max_retries: 3,
            timeout: Duration::from_secs(30),
            seen_file: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_keywords_rejected() {
        let mut config = base_config();
        config.keywords.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoKeywords)));
    }

    #[test]
    fn zero_max_jobs_rejected() {
        let mut config = base_config();
        config.max_jobs_per_platform = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxJobs(0))
        ));
    }

    #[test]
    fn all_platforms_disabled_rejected() {
        let mut config = base_config();
        config.indeed_enabled = false;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoPlatformsEnabled)
        ));
    }

    #[test]
    fn jsearch_without_key_rejected() {
        let mut config = base_config();
        config.jsearch_enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn file_values_fill_in_when_cli_silent() {
        let cli = Cli::parse_from(["jobharvest"]);
        let file: FileConfig = serde_json::from_str(
            r#"{
                "search_keywords": ["rust engineer"],
                "locations": ["Berlin"],
                "max_jobs_per_platform": 25,
                "platforms": {"indeed": false, "jsearch": true},
                "jsearch_api_key": "k"
            }"#,
        )
        .unwrap();

        let config = RunConfig::merge(&cli, &file);
        assert_eq!(config.keywords, vec!["rust engineer"]);
        assert_eq!(config.max_jobs_per_platform, 25);
        assert!(!config.indeed_enabled);
        assert!(config.jsearch_enabled);
        assert_eq!(config.jsearch_api_key, "k");
    }

    #[test]
    fn cli_overrides_file() {
        let cli = Cli::parse_from(["jobharvest", "--keyword", "golang", "--max-jobs", "5"]);
        let file: FileConfig = serde_json::from_str(
            r#"{"search_keywords": ["rust"], "max_jobs_per_platform": 25}"#,
        )
        .unwrap();

        let config = RunConfig::merge(&cli, &file);
        assert_eq!(config.keywords, vec!["golang"]);
        assert_eq!(config.max_jobs_per_platform, 5);
    }
}
