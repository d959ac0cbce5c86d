use chrono::{DateTime, Utc};

use crate::github::models::Repository;
use crate::pr::pr_key;

/// Stage 1 input.
#[derive(Debug, Clone)]
pub struct OrgJob {
    pub org: String,
}

/// Stage 2 and 3 input: one repository to scan for activity.
#[derive(Debug, Clone)]
pub struct RepoJob {
    pub org: String,
    pub repo: String,
    /// Metadata as listed by the organization stage.
    pub metadata: Repository,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// Issue activity newer than the cached content.
    IssueActivity,
    /// Pull request, review or review comment event after the last fetch.
    Changed,
    /// A comment-level event; rescoring needs fresh counters.
    MiscActivity,
    /// The event log shows it closed; confirm and drop.
    Closed,
}

/// Stage 4 input: a shallow reference to one pull request.
#[derive(Debug, Clone)]
pub struct PrJob {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub reason: RefreshReason,
}

impl PrJob {
    pub fn key(&self) -> String {
        pr_key(&self.org, &self.repo, self.number)
    }
}

/// Pull request activity reconstructed from an issue listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrActivity {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub updated_at: DateTime<Utc>,
    /// The issue reports the pull request closed.
    pub closed: bool,
}

impl PrActivity {
    pub fn cache_key(&self) -> String {
        pr_key(&self.org, &self.repo, self.number)
    }
}
