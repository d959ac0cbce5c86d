use chrono::{DateTime, Duration, Utc};

use crate::github::models::Event;

/// Event logs keep this many days of history.
pub const EVENT_RETENTION_DAYS: i64 = 30;

/// Merge freshly fetched events (newest first) ahead of the cached log,
/// keeping only those newer than the newest cached event, then trim.
pub fn merge_events(cached: Vec<Event>, fetched: Vec<Event>, now: DateTime<Utc>) -> Vec<Event> {
    let merged = match cached.first() {
        Some(newest) => {
            let newest_at = newest.created_at;
            let mut merged: Vec<Event> = fetched
                .into_iter()
                .filter(|e| e.created_at > newest_at)
                .collect();
            merged.extend(cached);
            merged
        }
        None => fetched,
    };
    trim_events(merged, now)
}

/// Drop events older than the retention window; retained events keep their
/// relative order.
pub fn trim_events(events: Vec<Event>, now: DateTime<Utc>) -> Vec<Event> {
    let cutoff = now - Duration::days(EVENT_RETENTION_DAYS);
    events
        .into_iter()
        .filter(|e| e.created_at > cutoff)
        .collect()
}
