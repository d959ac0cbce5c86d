//! Bring one tracked pull request up to date, fetching only the
//! sub-resources whose remote counters say something changed.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::jobs::PrJob;
use crate::github::{ApiError, Gateway, GithubApi};
use crate::github::models::PullRequest;
use crate::pr::TrackedPullRequest;

#[derive(Debug)]
pub enum Refreshed {
    /// Still open; sub-resources are current.
    Open(TrackedPullRequest),
    /// No longer open; only the final snapshot was stored.
    Closed(TrackedPullRequest),
}

/// Which sub-resources a refresh has to re-fetch, given the cached snapshot
/// (if any) and the current remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPlan {
    pub commits: bool,
    pub comments: bool,
    pub reviews: bool,
    pub status: bool,
}

impl RefreshPlan {
    pub fn new(cached: &TrackedPullRequest, current: &PullRequest) -> Self {
        let previous = cached.remote.as_ref();
        let newer = previous.is_none_or(|p| current.updated_at > p.updated_at);

        let commits = previous.is_none_or(|p| p.head.sha != current.head.sha);
        let comments = previous.is_none() || (current.comments > 0 && newer);
        let reviews = previous.is_none() || (current.review_comments > 0 && newer);
        let status = commits
            || comments
            || reviews
            || cached
                .status
                .as_ref()
                .is_none_or(|s| s.sha != current.head.sha);

        Self {
            commits,
            comments,
            reviews,
            status,
        }
    }
}

/// Fetch the full detail of `job` and fold it into `cached` (or a fresh
/// shallow entry). Any API error aborts this pull request only.
pub async fn refresh_pull_request<A: GithubApi>(
    gateway: &Gateway<A>,
    cached: Option<TrackedPullRequest>,
    job: &PrJob,
    now: DateTime<Utc>,
) -> Result<Refreshed, ApiError> {
    let (org, repo, number) = (job.org.as_str(), job.repo.as_str(), job.number);
    let label = job.key();

    let current = gateway.get_pull(org, repo, number).await?;
    let mut tracked = cached.unwrap_or_else(|| TrackedPullRequest::shallow(org, repo, number));

    if !current.is_open() {
        gateway.status(format!("{label} closed"));
        tracked.remote = Some(current);
        tracked.last_updated_at = Some(now);
        return Ok(Refreshed::Closed(tracked));
    }

    let plan = RefreshPlan::new(&tracked, &current);
    debug!(pr = %label, reason = ?job.reason, ?plan, "Refreshing pull request");

    if plan.commits {
        gateway.status(format!("{label} updating commits..."));
        let (commits, page) = gateway.list_commits(org, repo, number).await.into_result()?;
        tracked.commits = commits;
        tracked.last_commits_page = page;
    }

    if plan.comments {
        gateway.status(format!("{label} updating comments..."));
        let (comments, page) = gateway
            .list_review_comments(org, repo, number)
            .await
            .into_result()?;
        tracked.comments = comments;
        tracked.last_comments_page = page;
    }

    if plan.reviews {
        gateway.status(format!("{label} updating reviews..."));
        let (reviews, page) = gateway.list_reviews(org, repo, number).await.into_result()?;
        tracked.reviews = reviews;
        tracked.last_reviews_page = page;
    }

    if plan.status {
        gateway.status(format!("{label} fetching status..."));
        tracked.status = Some(gateway.combined_status(org, repo, &current.head.sha).await?);
    }

    tracked.remote = Some(current);
    tracked.last_updated_at = Some(now);
    tracked.viewed_at = None;
    Ok(Refreshed::Open(tracked))
}
