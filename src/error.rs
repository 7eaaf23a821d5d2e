#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Browser session error: {0}")]
    Browser(String),

    #[error("Cannot start a browser session: {0}")]
    SessionUnavailable(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Rate limited by remote service")]
    RateLimited,

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl FetchError {
    /// Whether another attempt may succeed. Throttling, timeouts and
    /// server errors are transient; auth failures and other client-side
    /// 4xx responses are permanent for the task.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_)
            | FetchError::Network(_)
            | FetchError::Browser(_)
            | FetchError::RateLimited => true,
            FetchError::Http { status, .. } => *status == 429 || *status >= 500,
            FetchError::SessionUnavailable(_)
            | FetchError::Parse(_)
            | FetchError::RetriesExhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else if e.is_connect() || e.is_request() {
            FetchError::Network(e.to_string())
        } else {
            FetchError::Http {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid listing URL '{0}'")]
    InvalidUrl(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No search keywords configured")]
    NoKeywords,

    #[error("No locations configured")]
    NoLocations,

    #[error("max_jobs_per_platform must be positive (got {0})")]
    InvalidMaxJobs(i64),

    #[error("All platforms are disabled")]
    NoPlatformsEnabled,

    #[error("JSearch is enabled but no API key is configured")]
    MissingApiKey,

    #[error("Failed to read config file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error writing export: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
