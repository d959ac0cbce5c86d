use prsync::util::filter::{NameFilter, glob_match};

#[test]
fn test_glob_literal_and_wildcards() {
    assert!(glob_match("widgets", "widgets"));
    assert!(!glob_match("widgets", "widgets2"));
    assert!(glob_match("*", "anything"));
    assert!(glob_match("*", ""));
    assert!(glob_match("wid*", "widgets"));
    assert!(glob_match("*gets", "widgets"));
    assert!(glob_match("w*g*s", "widgets"));
    assert!(!glob_match("w*z*s", "widgets"));
}

#[test]
fn test_glob_is_anchored() {
    assert!(glob_match("a*b", "axbxb"));
    assert!(!glob_match("a*b", "axbxc"));
    assert!(!glob_match("ab*ba", "aba"));
    assert!(glob_match("acme/*", "acme/widgets"));
    assert!(!glob_match("acme/*", "other/acme/widgets"));
}

#[test]
fn test_empty_filter_allows_everything() {
    let filter = NameFilter::default();
    assert!(filter.allows("anything"));
}

#[test]
fn test_deny_list_wins() {
    let filter = NameFilter::new(&["acme*".to_string()], &["acme-secret".to_string()]);
    assert!(filter.allows("acme-public"));
    assert!(!filter.allows("acme-secret"));
    assert!(!filter.allows("other"));
}

#[test]
fn test_any_alias_may_match() {
    let filter = NameFilter::new(&["acme/*".to_string()], &[]);
    assert!(filter.allows_any(&["widgets", "acme/widgets"]));
    assert!(!filter.allows_any(&["widgets", "other/widgets"]));
}
