use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::importance::{self, Importance};
use super::{PrError, TriageProfile};
use crate::github::models::{CombinedStatus, Commit, PullRequest, Review, ReviewComment};
use crate::util::time::minutes_since;

pub fn pr_key(org: &str, repo: &str, number: u64) -> String {
    format!("{org}/{repo}/{number}")
}

/// Fields derived from the remote snapshot, the viewer and the clock. Always
/// recomputed by [`TrackedPullRequest::rescore`] before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DerivedStatus {
    pub author: String,
    pub labels: Vec<String>,
    pub requested_reviewers: Vec<String>,
    pub num_commits: usize,
    pub num_comments: usize,

    pub first_commit_at: Option<DateTime<Utc>>,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub last_comment_at: Option<DateTime<Utc>>,
    pub last_comment_from_me_at: Option<DateTime<Utc>>,

    pub minutes_since_last_comment: i64,
    pub minutes_since_last_commit: i64,
    pub minutes_since_first_commit: i64,

    pub i_am_author: bool,
    pub author_is_teammate: bool,
    pub author_is_bot: bool,
    pub has_comments_from_me: bool,
    pub last_comment_from_me: bool,
    pub has_changes_after_last_comment: bool,
    /// A commit landed after my most recent comment.
    pub has_new_changes: bool,
    /// Nothing newer than the viewed marker has been seen.
    pub has_unseen_changes: bool,
    pub is_approved: bool,
    pub is_abandoned: bool,
    pub is_draft: bool,
    pub mergeable: bool,
    pub job_state_success: bool,

    pub additions: u64,
    pub deletions: u64,
    pub code_delta: u64,
}

/// A pull request as tracked locally: the remote snapshot, its fetched
/// sub-resources, the derived status and the resulting importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPullRequest {
    pub org: String,
    pub repo: String,
    pub number: u64,

    /// When the content was last fetched from the remote.
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub remote: Option<PullRequest>,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub comments: Vec<ReviewComment>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub status: Option<CombinedStatus>,
    #[serde(default)]
    pub last_commits_page: u32,
    #[serde(default)]
    pub last_comments_page: u32,
    #[serde(default)]
    pub last_reviews_page: u32,

    #[serde(default)]
    pub derived: DerivedStatus,

    #[serde(default)]
    pub importance: f64,
    #[serde(default)]
    pub importance_breakdown: BTreeMap<String, f64>,

    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

impl TrackedPullRequest {
    /// Shallow reference: identity only, nothing fetched yet.
    pub fn shallow(org: &str, repo: &str, number: u64) -> Self {
        Self {
            org: org.to_string(),
            repo: repo.to_string(),
            number,
            last_updated_at: None,
            remote: None,
            commits: Vec::new(),
            comments: Vec::new(),
            reviews: Vec::new(),
            status: None,
            last_commits_page: 0,
            last_comments_page: 0,
            last_reviews_page: 0,
            derived: DerivedStatus::default(),
            importance: 0.0,
            importance_breakdown: BTreeMap::new(),
            viewed_at: None,
        }
    }

    pub fn key(&self) -> String {
        pr_key(&self.org, &self.repo, self.number)
    }

    pub fn is_open(&self) -> bool {
        self.remote.as_ref().is_some_and(PullRequest::is_open)
    }

    pub fn title(&self) -> &str {
        self.remote.as_ref().map_or("", |r| r.title.as_str())
    }

    /// Recompute the derived status against `now` and score it. This is the
    /// only path that writes `importance`.
    pub fn rescore(&mut self, profile: &TriageProfile, now: DateTime<Utc>) -> Result<(), PrError> {
        self.derive_status(profile, now)?;
        let Importance { value, breakdown } = importance::score(&self.derived);
        self.importance = value;
        self.importance_breakdown = breakdown;
        Ok(())
    }

    fn derive_status(&mut self, profile: &TriageProfile, now: DateTime<Utc>) -> Result<(), PrError> {
        let remote = self.remote.as_ref().ok_or_else(|| PrError::MissingSnapshot {
            key: pr_key(&self.org, &self.repo, self.number),
        })?;
        let me = profile.username.as_str();

        let author = remote.author().to_string();
        let mut d = DerivedStatus {
            i_am_author: !me.is_empty() && author == me,
            author_is_teammate: profile.teammates.iter().any(|t| *t == author),
            author_is_bot: profile.bots.iter().any(|b| *b == author),
            author,
            labels: remote.labels.iter().map(|l| l.name.clone()).collect(),
            requested_reviewers: remote
                .requested_reviewers
                .iter()
                .map(|u| u.login.clone())
                .collect(),
            num_commits: self.commits.len(),
            num_comments: self.comments.len(),
            is_draft: remote.draft,
            mergeable: remote.mergeable.unwrap_or(false),
            job_state_success: self.status.as_ref().is_some_and(|s| s.state == "success"),
            additions: remote.additions,
            deletions: remote.deletions,
            code_delta: remote.additions + remote.deletions,
            is_approved: self.reviews.iter().any(|r| r.state == "APPROVED"),
            ..DerivedStatus::default()
        };

        // Comments; the clock starts at PR creation
        let mut last_comment_at = remote.created_at;
        let mut last_comment_author = None;
        let mut last_from_me: Option<DateTime<Utc>> = None;
        for c in &self.comments {
            let login = c.user.as_ref().map(|u| u.login.as_str());
            if c.created_at >= last_comment_at {
                last_comment_at = c.created_at;
                last_comment_author = login;
            }
            if !me.is_empty() && login == Some(me) {
                d.has_comments_from_me = true;
                if last_from_me.is_none_or(|t| t < c.created_at) {
                    last_from_me = Some(c.created_at);
                }
            }
        }
        d.last_comment_at = Some(last_comment_at);
        d.last_comment_from_me_at = last_from_me;
        d.last_comment_from_me = !me.is_empty() && last_comment_author == Some(me);
        d.minutes_since_last_comment = minutes_since(last_comment_at, now);

        // Commits
        let mut first_commit_at = remote.created_at;
        let mut last_commit_at = remote.created_at;
        for t in self.commits.iter().filter_map(Commit::committed_at) {
            first_commit_at = first_commit_at.min(t);
            last_commit_at = last_commit_at.max(t);
        }
        d.first_commit_at = Some(first_commit_at);
        d.last_commit_at = Some(last_commit_at);
        d.minutes_since_last_commit = minutes_since(last_commit_at, now);
        d.minutes_since_first_commit = minutes_since(first_commit_at, now);

        d.has_new_changes = last_from_me.is_some_and(|mine| last_commit_at > mine);
        d.is_abandoned = now > last_commit_at + Duration::days(profile.abandoned_age_days);
        d.has_changes_after_last_comment =
            self.comments.is_empty() || last_comment_at < last_commit_at;

        // New commits or comments invalidate the viewed marker
        if let Some(viewed) = self.viewed_at
            && (last_commit_at > viewed || last_comment_at > viewed)
        {
            self.viewed_at = None;
        }
        d.has_unseen_changes = self.viewed_at.is_none();

        self.derived = d;
        Ok(())
    }
}
