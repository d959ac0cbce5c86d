pub mod importance;
pub mod tracked;

use thiserror::Error;

pub use importance::{Importance, score};
pub use tracked::{DerivedStatus, TrackedPullRequest, pr_key};

/// Who is looking, and whose pull requests get special treatment.
#[derive(Debug, Clone, Default)]
pub struct TriageProfile {
    pub username: String,
    pub teammates: Vec<String>,
    pub bots: Vec<String>,
    pub abandoned_age_days: i64,
}

#[derive(Debug, Error)]
pub enum PrError {
    #[error("pull request {key} has no fetched snapshot to score")]
    MissingSnapshot { key: String },
}
