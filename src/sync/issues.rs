use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use super::jobs::PrActivity;
use crate::github::models::Issue;
use crate::util::time::days_before;

#[derive(Debug, Error, PartialEq)]
pub enum ActivityError {
    #[error("issue #{0} is not a pull request")]
    NotAPullRequest(u64),
    #[error("cannot parse pull request url {url}: {reason}")]
    BadUrl { url: String, reason: String },
    #[error("cannot parse pull request number {0:?}")]
    BadNumber(String),
}

/// Recover `org/repo/number` from the pull request link of an issue, e.g.
/// `https://github.com/org/repo/pull/42`.
pub fn activity_from_issue(issue: &Issue) -> Result<PrActivity, ActivityError> {
    let html_url = issue
        .pull_request
        .as_ref()
        .and_then(|links| links.html_url.as_deref())
        .ok_or(ActivityError::NotAPullRequest(issue.number))?;

    let url = Url::parse(html_url).map_err(|e| ActivityError::BadUrl {
        url: html_url.to_string(),
        reason: e.to_string(),
    })?;

    let parts: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();
    let [org, repo, _, number, ..] = parts.as_slice() else {
        return Err(ActivityError::BadUrl {
            url: html_url.to_string(),
            reason: format!("expected 4 path segments, got {}", parts.len()),
        });
    };
    let number = number
        .parse()
        .map_err(|_| ActivityError::BadNumber((*number).to_string()))?;

    Ok(PrActivity {
        org: (*org).to_string(),
        repo: (*repo).to_string(),
        number,
        updated_at: issue.updated_at,
        closed: issue.is_closed(),
    })
}

/// Most recent activity among cached pull request issues.
pub fn most_recent_activity<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Option<DateTime<Utc>> {
    issues
        .into_iter()
        .filter_map(|issue| activity_from_issue(issue).ok())
        .map(|a| a.updated_at)
        .max()
}

/// Issues are pulled from the later of the abandonment window and the newest
/// activity already cached.
pub fn look_back_since(
    now: DateTime<Utc>,
    abandoned_age_days: i64,
    most_recent: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let floor = days_before(now, abandoned_age_days);
    most_recent.map_or(floor, |t| t.max(floor))
}

/// Fold fetched issues into the cache map: pull request issues are keyed by
/// their activity key, plain issues and unparsable links are skipped, and
/// anything older than the abandonment window is pruned. A cached issue known
/// to be closed is only replaced by strictly newer activity. Returns how many
/// entries were written.
pub fn merge_issues(
    cache: &mut HashMap<String, Issue>,
    fetched: Vec<Issue>,
    now: DateTime<Utc>,
    abandoned_age_days: i64,
) -> usize {
    let mut written = 0;
    for issue in fetched {
        let Ok(activity) = activity_from_issue(&issue) else {
            continue;
        };
        match cache.entry(activity.cache_key()) {
            Entry::Occupied(mut cached) => {
                let stale = cached.get().is_closed() && issue.updated_at <= cached.get().updated_at;
                if !stale {
                    cached.insert(issue);
                    written += 1;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(issue);
                written += 1;
            }
        }
    }

    let cutoff = days_before(now, abandoned_age_days);
    cache.retain(|_, issue| issue.updated_at >= cutoff);
    written
}

/// Record that the pull request behind `key` was confirmed closed, so later
/// cycles skip it until the issue shows newer activity. Returns whether a
/// cached issue was changed.
pub fn mark_issue_closed(
    cache: &mut HashMap<String, Issue>,
    key: &str,
    closed_at: DateTime<Utc>,
) -> bool {
    let Some(issue) = cache.get_mut(key) else {
        return false;
    };
    if issue.is_closed() {
        return false;
    }
    issue.state = "closed".into();
    issue.closed_at = Some(closed_at);
    true
}
