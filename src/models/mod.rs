pub mod listing;
pub mod stats;
pub mod task;

pub use listing::{JobListing, RawListing, Source};
pub use stats::{RunStatistics, SourceStats};
pub use task::SearchTask;
