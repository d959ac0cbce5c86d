use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pr::TriageProfile;
use crate::util::filter::NameFilter;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub include_orgs: Vec<String>,
    #[serde(default)]
    pub exclude_orgs: Vec<String>,
    #[serde(default)]
    pub include_repos: Vec<String>,
    #[serde(default)]
    pub exclude_repos: Vec<String>,
    /// `org/repo` pairs tracked regardless of organization membership.
    #[serde(default)]
    pub public_repos: Vec<String>,
    #[serde(default)]
    pub teammates: Vec<String>,
    #[serde(default)]
    pub bots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_abandoned_age_days")]
    pub abandoned_age_days: i64,
    #[serde(default = "default_workers")]
    pub workers_per_stage: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_true")]
    pub refresh_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_abandoned_age_days() -> i64 {
    21
}
fn default_workers() -> usize {
    2
}
fn default_page_size() -> u32 {
    100
}
fn default_true() -> bool {
    true
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: String::new(),
            token: None,
            include_orgs: Vec::new(),
            exclude_orgs: Vec::new(),
            include_repos: Vec::new(),
            exclude_repos: Vec::new(),
            public_repos: Vec::new(),
            teammates: Vec::new(),
            bots: Vec::new(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            abandoned_age_days: default_abandoned_age_days(),
            workers_per_stage: default_workers(),
            page_size: default_page_size(),
            refresh_on_start: true,
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: AppConfig =
                toml::from_str(&content).with_context(|| "Failed to parse config file")?;
            return Ok(config);
        }

        // Search candidate paths in order
        let mut candidates = Vec::new();

        // 1. ~/.config/prsync/config.toml (standard XDG on all platforms)
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".config/prsync/config.toml"));
        }

        // 2. Platform-specific path from `directories` crate
        //    (macOS: ~/Library/Application Support/prsync/)
        if let Some(proj_dirs) = ProjectDirs::from("", "", "prsync") {
            candidates.push(proj_dirs.config_dir().join("config.toml"));
        }

        for config_path in &candidates {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path).with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;
                let config: AppConfig =
                    toml::from_str(&content).with_context(|| "Failed to parse config file")?;
                return Ok(config);
            }
        }

        // Fallback to default
        Ok(AppConfig::default())
    }

    pub fn cache_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.cache.dir {
            return dir.clone();
        }
        if let Some(proj_dirs) = ProjectDirs::from("", "", "prsync") {
            return proj_dirs.cache_dir().to_path_buf();
        }
        PathBuf::from(".cache/prsync")
    }

    pub fn log_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "prsync") {
            return proj_dirs.data_dir().join("logs");
        }
        PathBuf::from(".local/share/prsync/logs")
    }

    pub fn org_filter(&self) -> NameFilter {
        NameFilter::new(&self.github.include_orgs, &self.github.exclude_orgs)
    }

    pub fn repo_filter(&self) -> NameFilter {
        NameFilter::new(&self.github.include_repos, &self.github.exclude_repos)
    }

    /// Configured public repositories as `(org, repo)` pairs; malformed
    /// entries are skipped.
    pub fn public_repos(&self) -> Vec<(String, String)> {
        self.github
            .public_repos
            .iter()
            .filter_map(|entry| {
                let (org, repo) = entry.trim().split_once('/')?;
                if org.is_empty() || repo.is_empty() || repo.contains('/') {
                    return None;
                }
                Some((org.to_string(), repo.to_string()))
            })
            .collect()
    }

    pub fn triage_profile(&self) -> TriageProfile {
        TriageProfile {
            username: self.github.username.clone(),
            teammates: self.github.teammates.clone(),
            bots: self.github.bots.clone(),
            abandoned_age_days: self.sync.abandoned_age_days,
        }
    }
}
