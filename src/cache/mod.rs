pub mod store;

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::github::models::{Event, Issue, Organization, Repository};
use crate::pr::TrackedPullRequest;
use crate::util::time::days_before;

pub use store::{CacheFile, CacheKind};

/// Key of a repository-scoped entry (event logs).
pub fn repo_key(org: &str, repo: &str) -> String {
    format!("{org}/{repo}")
}

/// The five persisted caches, each independently locked and saved.
#[derive(Debug)]
pub struct Caches {
    /// Keyed by organization login.
    pub orgs: CacheFile<Organization>,
    /// Keyed by organization login, then repository name.
    pub repos: CacheFile<HashMap<String, Repository>>,
    /// Keyed by `org/repo/number`.
    pub prs: CacheFile<TrackedPullRequest>,
    /// Keyed by `org/repo/number` taken from the pull request URL.
    pub issues: CacheFile<Issue>,
    /// Keyed by `org/repo`, newest event first.
    pub events: CacheFile<Vec<Event>>,
}

impl Caches {
    /// Load every kind from `dir`, dropping pull requests whose remote
    /// `updated_at` is older than the abandonment window.
    pub async fn load(dir: &Path, abandoned_age_days: i64, now: DateTime<Utc>) -> Self {
        let caches = Self {
            orgs: CacheFile::load(dir, CacheKind::Orgs),
            repos: CacheFile::load(dir, CacheKind::Repos),
            prs: CacheFile::load(dir, CacheKind::PullRequests),
            issues: CacheFile::load(dir, CacheKind::Issues),
            events: CacheFile::load(dir, CacheKind::Events),
        };

        let cutoff = days_before(now, abandoned_age_days);
        let dropped = caches
            .prs
            .retain(|_, pr| pr.remote.as_ref().is_some_and(|r| r.updated_at > cutoff))
            .await;
        if dropped > 0 {
            info!(dropped, "Trimmed stale pull requests from cache");
        }

        caches
    }

    pub async fn get_repo(&self, org: &str, repo: &str) -> Option<Repository> {
        self.repos
            .get(org)
            .await
            .and_then(|repos| repos.get(repo).cloned())
    }

    pub async fn repos_for_org(&self, org: &str) -> Vec<Repository> {
        self.repos
            .get(org)
            .await
            .map(|repos| repos.into_values().collect())
            .unwrap_or_default()
    }

    pub async fn put_repo(&self, org: &str, repo: Repository) {
        self.repos
            .write(|orgs| {
                orgs.entry(org.to_string())
                    .or_default()
                    .insert(repo.name.clone(), repo);
            })
            .await;
    }

    /// Record an organization's repository listing. A complete listing
    /// replaces what was cached for the organization; a partial one only adds.
    pub async fn put_org_repos(&self, org: &str, listed: &[Repository], complete: bool) {
        self.repos
            .write(|orgs| {
                let repos = orgs.entry(org.to_string()).or_default();
                if complete {
                    repos.clear();
                }
                for repo in listed {
                    repos.insert(repo.name.clone(), repo.clone());
                }
            })
            .await;
    }

    pub async fn save_all(&self) -> Result<()> {
        self.orgs.save().await?;
        self.repos.save().await?;
        self.prs.save().await?;
        self.issues.save().await?;
        self.events.save().await?;
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.orgs.clear().await?;
        self.repos.clear().await?;
        self.prs.clear().await?;
        self.issues.clear().await?;
        self.events.clear().await?;
        Ok(())
    }
}
