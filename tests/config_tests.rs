use std::io::Write;
use tempfile::NamedTempFile;

use prsync::sync::SyncSettings;
use prsync::util::config::AppConfig;

#[test]
fn test_load_full_config() {
    let toml = r#"
[github]
api_url = "https://github.example.com/api/v3"
username = "me"
token = "ghp_example"
include_orgs = ["acme*"]
exclude_orgs = ["acme-legacy"]
include_repos = ["important-*"]
exclude_repos = ["*-archived"]
public_repos = ["rust-lang/rust"]
teammates = ["alice", "bob"]
bots = ["dependabot[bot]"]

[sync]
abandoned_age_days = 14
workers_per_stage = 4
page_size = 50
refresh_on_start = false

[cache]
dir = "/tmp/prsync-cache"
"#;
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(toml.as_bytes()).unwrap();

    let config = AppConfig::load(Some(f.path())).unwrap();
    assert_eq!(config.github.api_url, "https://github.example.com/api/v3");
    assert_eq!(config.github.username, "me");
    assert_eq!(config.github.token.as_deref(), Some("ghp_example"));
    assert_eq!(config.github.include_repos, vec!["important-*"]);
    assert_eq!(config.github.exclude_repos, vec!["*-archived"]);
    assert_eq!(config.github.teammates, vec!["alice", "bob"]);
    assert_eq!(config.sync.abandoned_age_days, 14);
    assert_eq!(config.sync.workers_per_stage, 4);
    assert_eq!(config.sync.page_size, 50);
    assert!(!config.sync.refresh_on_start);
    assert_eq!(
        config.cache_dir(),
        std::path::PathBuf::from("/tmp/prsync-cache")
    );

    let profile = config.triage_profile();
    assert_eq!(profile.username, "me");
    assert_eq!(profile.bots, vec!["dependabot[bot]"]);
    assert_eq!(profile.abandoned_age_days, 14);
}

#[test]
fn test_load_partial_config_uses_defaults() {
    let toml = r#"
[github]
username = "me"
"#;
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(toml.as_bytes()).unwrap();

    let config = AppConfig::load(Some(f.path())).unwrap();
    assert_eq!(config.github.username, "me");
    assert_eq!(config.github.api_url, "https://api.github.com");
    assert!(config.github.token.is_none());
    assert_eq!(config.sync.abandoned_age_days, 21);
    assert_eq!(config.sync.workers_per_stage, 2);
    assert_eq!(config.sync.page_size, 100);
    assert!(config.sync.refresh_on_start);
}

#[test]
fn test_load_empty_config_uses_all_defaults() {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(b"").unwrap();

    let config = AppConfig::load(Some(f.path())).unwrap();
    assert!(config.github.username.is_empty());
    assert!(config.github.public_repos.is_empty());
    assert_eq!(config.sync.abandoned_age_days, 21);
    assert!(config.cache.dir.is_none());
}

#[test]
fn test_load_nonexistent_file_fails() {
    let result = AppConfig::load(Some(std::path::Path::new("/nonexistent/path/config.toml")));
    assert!(result.is_err());
}

#[test]
fn test_load_invalid_toml_fails() {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(b"this is not [valid toml {{").unwrap();

    let result = AppConfig::load(Some(f.path()));
    assert!(result.is_err());
}

#[test]
fn test_public_repos_skip_malformed_entries() {
    let mut config = AppConfig::default();
    config.github.public_repos = vec![
        "rust-lang/rust".into(),
        " tokio-rs/tokio ".into(),
        "no-slash".into(),
        "a/b/c".into(),
        "/missing-org".into(),
    ];
    assert_eq!(
        config.public_repos(),
        vec![
            ("rust-lang".to_string(), "rust".to_string()),
            ("tokio-rs".to_string(), "tokio".to_string()),
        ]
    );
}

#[test]
fn test_sync_settings_filters() {
    let mut config = AppConfig::default();
    config.github.include_orgs = vec!["acme*".into()];
    config.github.exclude_orgs = vec!["acme-legacy".into()];
    config.github.include_repos = vec!["acme/*".into(), "tools-*".into()];
    config.github.exclude_repos = vec!["*-archived".into()];
    config.github.public_repos = vec!["rust-lang/rust".into()];

    let settings = SyncSettings::from_config(&config);

    assert!(settings.org_filter.allows("acme"));
    assert!(settings.org_filter.allows("acme-labs"));
    assert!(!settings.org_filter.allows("acme-legacy"));
    assert!(!settings.org_filter.allows("initech"));

    // the repository name is compared, not the organization
    assert!(settings.repo_allowed("other", "tools-cli"));
    assert!(settings.repo_allowed("acme", "widgets"));
    assert!(!settings.repo_allowed("acme", "widgets-archived"));
    assert!(!settings.repo_allowed("other", "widgets"));

    assert!(settings.tracks("acme", "widgets"));
    assert!(!settings.tracks("initech", "tools-cli"));
    assert!(settings.tracks("rust-lang", "rust"));
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert!(config.github.include_orgs.is_empty());
    assert!(config.github.exclude_orgs.is_empty());
    assert!(config.github.include_repos.is_empty());
    assert!(config.github.exclude_repos.is_empty());
    assert_eq!(config.github.api_url, "https://api.github.com");
    assert_eq!(config.sync.workers_per_stage, 2);
    assert!(config.cache.dir.is_none());
}
