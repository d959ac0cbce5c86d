//! Decide which pull requests of a repository need work, from its event log
//! alone.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::github::models::{Event, EventPayload};
use crate::pr::TrackedPullRequest;
use crate::util::metrics;

/// Pull request numbers of one repository, by what must happen to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Cached content is current; rescore only.
    pub unchanged: Vec<u64>,
    /// Content changed after the last fetch.
    pub needs_refresh: Vec<u64>,
    /// Comment-level activity on an open pull request.
    pub misc_activity: Vec<u64>,
    /// Cached as open, but the log shows it closed.
    pub closed: Vec<u64>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.unchanged.is_empty()
            && self.needs_refresh.is_empty()
            && self.misc_activity.is_empty()
            && self.closed.is_empty()
    }
}

#[derive(Default)]
struct Sets {
    unchanged: BTreeSet<u64>,
    refresh: BTreeSet<u64>,
    misc: BTreeSet<u64>,
    closed: BTreeSet<u64>,
}

impl Sets {
    fn forget(&mut self, number: u64) {
        self.unchanged.remove(&number);
        self.refresh.remove(&number);
        self.misc.remove(&number);
    }

    fn mark_refresh(&mut self, number: u64) {
        self.unchanged.remove(&number);
        self.closed.remove(&number);
        self.refresh.insert(number);
    }

    fn mark_unchanged(&mut self, number: u64) {
        self.refresh.remove(&number);
        self.unchanged.insert(number);
    }
}

/// Walk `events` (stored newest first) from the oldest to the newest,
/// comparing each against the cached pull request it names. `lookup` resolves
/// a pull request number to its cache entry within the same repository.
pub fn derive_change_set<'a, L>(events: &[Event], lookup: L) -> ChangeSet
where
    L: Fn(u64) -> Option<&'a TrackedPullRequest>,
{
    let mut sets = Sets::default();

    // Content freshness of a cached entry; None when never fetched.
    let fetched_at = |number: u64| -> Option<DateTime<Utc>> {
        lookup(number).filter(|pr| pr.remote.is_some())?.last_updated_at
    };
    let cached_open = |number: u64| lookup(number).is_some_and(TrackedPullRequest::is_open);

    for event in events.iter().rev() {
        let payload = match event.parse_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(event = %event.id, kind = %event.kind, error = %e, "Failed to parse event payload");
                metrics::record("data.eventparse.error");
                continue;
            }
        };

        match payload {
            EventPayload::PullRequest {
                action,
                pull_request,
            } => {
                let number = pull_request.number;
                if action == "closed" {
                    sets.forget(number);
                    if cached_open(number) {
                        sets.closed.insert(number);
                    }
                    continue;
                }
                content_event(&mut sets, number, event.created_at, fetched_at(number));
            }
            EventPayload::Review { pull_request } | EventPayload::ReviewComment { pull_request } => {
                let number = pull_request.number;
                content_event(&mut sets, number, event.created_at, fetched_at(number));
            }
            EventPayload::IssueComment { issue } | EventPayload::Issue { issue } => {
                if !issue.is_pull_request() {
                    continue;
                }
                let number = issue.number;
                if fetched_at(number).is_some_and(|t| t > event.created_at) {
                    // our data is newer
                    continue;
                }
                if issue.closed_at.is_some() {
                    sets.forget(number);
                    if cached_open(number) {
                        sets.closed.insert(number);
                    }
                } else {
                    sets.closed.remove(&number);
                    sets.misc.insert(number);
                }
            }
            EventPayload::Other => {}
        }
    }

    ChangeSet {
        unchanged: sets.unchanged.into_iter().collect(),
        needs_refresh: sets.refresh.into_iter().collect(),
        misc_activity: sets.misc.into_iter().collect(),
        closed: sets.closed.into_iter().collect(),
    }
}

fn content_event(
    sets: &mut Sets,
    number: u64,
    event_at: DateTime<Utc>,
    fetched_at: Option<DateTime<Utc>>,
) {
    match fetched_at {
        // never seen, always load it
        None => sets.mark_refresh(number),
        // this event is older than our last data update
        Some(t) if t > event_at => sets.mark_unchanged(number),
        Some(_) => sets.mark_refresh(number),
    }
}
