//! The sync engine: keeps the local pull request caches current with the
//! remote, spending API calls only where the event and issue logs show
//! change.

pub mod detector;
pub mod events;
pub mod issues;
pub mod jobs;
pub mod pipeline;
pub mod refresh;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Caches;
use crate::github::{Gateway, GithubApi, RateLimit};
use crate::pr::{TrackedPullRequest, TriageProfile, pr_key};
use crate::util::config::AppConfig;
use crate::util::filter::NameFilter;

pub use detector::{ChangeSet, derive_change_set};
pub use issues::ActivityError;
pub use jobs::{OrgJob, PrActivity, PrJob, RefreshReason, RepoJob};
use pipeline::SyncContext;

/// What to track and how hard to work at it.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub profile: TriageProfile,
    pub org_filter: NameFilter,
    pub repo_filter: NameFilter,
    pub public_repos: Vec<(String, String)>,
    pub workers_per_stage: usize,
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            profile: config.triage_profile(),
            org_filter: config.org_filter(),
            repo_filter: config.repo_filter(),
            public_repos: config.public_repos(),
            workers_per_stage: config.sync.workers_per_stage,
        }
    }

    /// Repository allow/deny lists match the repository name or `org/repo`.
    pub fn repo_allowed(&self, org: &str, repo: &str) -> bool {
        self.repo_filter
            .allows_any(&[repo, format!("{org}/{repo}").as_str()])
    }

    pub fn is_public_repo(&self, org: &str, repo: &str) -> bool {
        self.public_repos.iter().any(|(o, r)| o == org && r == repo)
    }

    /// Whether activity in `org/repo` is of interest at all. Public
    /// repositories bypass the organization filter.
    pub fn tracks(&self, org: &str, repo: &str) -> bool {
        if self.is_public_repo(org, repo) {
            return true;
        }
        self.org_filter.allows(org) && self.repo_allowed(org, repo)
    }
}

/// Receiving ends for the external consumer. Never closed by the engine.
pub struct SyncOutputs {
    /// Human-readable progress; an empty string clears it.
    pub status: mpsc::UnboundedReceiver<String>,
    /// Last observed rate-limit snapshot.
    pub quota: mpsc::UnboundedReceiver<RateLimit>,
    /// One record per touched or rescored pull request.
    pub updates: mpsc::UnboundedReceiver<TrackedPullRequest>,
}

pub struct SyncEngine<A> {
    ctx: Arc<SyncContext<A>>,
    refreshing: Arc<AtomicBool>,
}

impl<A> Clone for SyncEngine<A> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            refreshing: Arc::clone(&self.refreshing),
        }
    }
}

/// Clears the refreshing flag however the cycle ends.
struct RefreshGuard(Arc<AtomicBool>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<A: GithubApi> SyncEngine<A> {
    pub fn new(api: A, caches: Caches, settings: SyncSettings) -> (Self, SyncOutputs) {
        let (status_tx, status) = mpsc::unbounded_channel();
        let (quota_tx, quota) = mpsc::unbounded_channel();
        let (updates_tx, updates) = mpsc::unbounded_channel();

        let ctx = SyncContext {
            gateway: Gateway::new(Arc::new(api), status_tx, quota_tx),
            caches,
            settings,
            updates_tx,
        };
        let engine = Self {
            ctx: Arc::new(ctx),
            refreshing: Arc::new(AtomicBool::new(false)),
        };
        (
            engine,
            SyncOutputs {
                status,
                quota,
                updates,
            },
        )
    }

    pub fn api(&self) -> &A {
        self.ctx.gateway.api()
    }

    pub fn caches(&self) -> &Caches {
        &self.ctx.caches
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.ctx.settings
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Run one refresh cycle to completion. Returns `false` without doing
    /// anything if a cycle is already running.
    pub async fn refresh(&self) -> bool {
        let Some(_guard) = self.claim() else {
            info!("Refresh already in progress");
            return false;
        };
        pipeline::run_cycle(Arc::clone(&self.ctx)).await;
        true
    }

    /// Start a refresh cycle in the background. `None` if one is already
    /// running.
    pub fn start_refresh(&self) -> Option<JoinHandle<()>> {
        let guard = self.claim()?;
        let ctx = Arc::clone(&self.ctx);
        Some(tokio::spawn(async move {
            let _guard = guard;
            pipeline::run_cycle(ctx).await;
        }))
    }

    fn claim(&self) -> Option<RefreshGuard> {
        self.refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RefreshGuard(Arc::clone(&self.refreshing)))
    }

    /// Replay the cached pull requests through the updates channel, each
    /// rescored against the current clock. Returns how many were emitted.
    pub async fn load_from_cache(&self) -> usize {
        let now = Utc::now();
        let profile = &self.ctx.settings.profile;
        let rescored = self
            .ctx
            .caches
            .prs
            .write(|prs| {
                prs.values_mut()
                    .filter_map(|pr| match pr.rescore(profile, now) {
                        Ok(()) => Some(pr.clone()),
                        Err(e) => {
                            debug!(error = %e, "Not replaying pull request");
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .await;

        let count = rescored.len();
        for pr in rescored {
            self.ctx.emit(pr);
        }
        info!(count, "Replayed cached pull requests");
        count
    }

    /// Persist every cache kind.
    pub async fn save_to_file(&self) -> Result<()> {
        self.ctx.caches.save_all().await
    }

    /// Record that the viewer opened a pull request, rescore it and persist
    /// right away. Returns `false` if it is not cached.
    pub async fn mark_viewed(&self, org: &str, repo: &str, number: u64) -> Result<bool> {
        let key = pr_key(org, repo, number);
        let now = Utc::now();
        let marked = self
            .ctx
            .caches
            .prs
            .update(&key, |pr| pr.viewed_at = Some(now))
            .await
            .is_some();
        if !marked {
            return Ok(false);
        }

        if let Some(pr) = self.ctx.rescore_cached(&key, now).await {
            self.ctx.emit(pr);
        }
        self.save_to_file().await?;
        Ok(true)
    }
}
