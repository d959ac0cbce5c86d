mod common;

use chrono::{Duration, Utc};

use common::*;
use prsync::sync::events::{EVENT_RETENTION_DAYS, merge_events, trim_events};

fn ids(events: &[prsync::github::models::Event]) -> Vec<&str> {
    events.iter().map(|e| e.id.as_str()).collect()
}

#[test]
fn test_trim_drops_events_past_retention() {
    let now = Utc::now();
    let events = vec![
        pr_event("4", "opened", 1, now - Duration::days(1)),
        pr_event("3", "opened", 2, now - Duration::days(29)),
        pr_event("2", "opened", 3, now - Duration::days(31)),
        pr_event("1", "opened", 4, now - Duration::days(90)),
    ];
    let trimmed = trim_events(events, now);
    assert_eq!(ids(&trimmed), vec!["4", "3"]);
}

#[test]
fn test_trim_keeps_relative_order() {
    let now = Utc::now();
    // deliberately not sorted
    let events = vec![
        pr_event("a", "opened", 1, now - Duration::days(3)),
        pr_event("b", "opened", 1, now - Duration::days(40)),
        pr_event("c", "opened", 1, now - Duration::days(1)),
        pr_event("d", "opened", 1, now - Duration::days(2)),
    ];
    let trimmed = trim_events(events, now);
    assert_eq!(ids(&trimmed), vec!["a", "c", "d"]);
}

#[test]
fn test_retention_is_thirty_days() {
    assert_eq!(EVENT_RETENTION_DAYS, 30);
}

#[test]
fn test_merge_puts_new_events_ahead_of_cached() {
    let now = Utc::now();
    let cached = vec![
        pr_event("2", "opened", 1, ago(now, 5)),
        pr_event("1", "opened", 1, ago(now, 6)),
    ];
    let fetched = vec![
        pr_event("4", "closed", 1, ago(now, 1)),
        pr_event("3", "synchronize", 1, ago(now, 2)),
        // overlap with the cache
        pr_event("2", "opened", 1, ago(now, 5)),
    ];
    let merged = merge_events(cached, fetched, now);
    assert_eq!(ids(&merged), vec!["4", "3", "2", "1"]);
}

#[test]
fn test_merge_into_empty_cache() {
    let now = Utc::now();
    let fetched = vec![
        pr_event("2", "opened", 1, ago(now, 1)),
        pr_event("1", "opened", 1, now - Duration::days(45)),
    ];
    let merged = merge_events(Vec::new(), fetched, now);
    assert_eq!(ids(&merged), vec!["2"]);
}
