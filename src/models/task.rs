use crate::models::Source;

/// One unit of search work: a keyword and location pair aimed at a single
/// source, capped at `max_results` listings. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTask {
    pub source: Source,
    pub keyword: String,
    pub location: String,
    pub max_results: usize,
}

impl SearchTask {
    pub fn new(source: Source, keyword: impl Into<String>, location: impl Into<String>, max_results: usize) -> Self {
        Self {
            source,
            keyword: keyword.into(),
            location: location.into(),
            max_results,
        }
    }
}

impl std::fmt::Display for SearchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: \"{}\" in \"{}\" (max {})",
            self.source, self.keyword, self.location, self.max_results
        )
    }
}
