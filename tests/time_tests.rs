use chrono::{Duration, Utc};
use prsync::util::time::{days_before, minutes_since, relative_time, relative_time_from};

#[test]
fn test_just_now() {
    let now = Utc::now();
    assert_eq!(relative_time(&now), "just now");
}

#[test]
fn test_seconds_ago() {
    let t = Utc::now() - Duration::seconds(30);
    assert_eq!(relative_time(&t), "just now");
}

#[test]
fn test_minutes_ago() {
    let now = Utc::now();
    assert_eq!(relative_time_from(&(now - Duration::minutes(45)), now), "45m ago");
}

#[test]
fn test_hours_ago() {
    let now = Utc::now();
    assert_eq!(relative_time_from(&(now - Duration::hours(23)), now), "23h ago");
}

#[test]
fn test_days_months_years() {
    let now = Utc::now();
    assert_eq!(relative_time_from(&(now - Duration::days(3)), now), "3d ago");
    assert_eq!(relative_time_from(&(now - Duration::days(65)), now), "2mo ago");
    assert_eq!(relative_time_from(&(now - Duration::days(800)), now), "2y ago");
}

#[test]
fn test_minutes_since_truncates_and_never_goes_negative() {
    let now = Utc::now();
    assert_eq!(minutes_since(now - Duration::seconds(150), now), 2);
    assert_eq!(minutes_since(now + Duration::hours(1), now), 0);
}

#[test]
fn test_days_before() {
    let now = Utc::now();
    assert_eq!(now - days_before(now, 21), Duration::days(21));
}
