//! One refresh cycle: the issue-driven activity pass followed by the four
//! stage worker pools (orgs, events, preprocess, refresh).
//!
//! Each stage owns the receiving end of a small bounded channel. Workers hold
//! the next stage's sender only through their handler, so when a stage's
//! input closes and its workers drain, the next stage's input closes too.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::detector::derive_change_set;
use super::events::merge_events;
use super::issues::{
    activity_from_issue, look_back_since, mark_issue_closed, merge_issues, most_recent_activity,
};
use super::jobs::{OrgJob, PrJob, RefreshReason, RepoJob};
use super::refresh::{Refreshed, refresh_pull_request};
use super::SyncSettings;
use crate::cache::{Caches, repo_key};
use crate::github::{Gateway, GithubApi};
use crate::pr::{TrackedPullRequest, pr_key};
use crate::util::time::days_before;

/// Inter-stage channels are near-unbuffered so the upstream stages run at the
/// pace of the rate-limited refresh stage.
pub const STAGE_CHANNEL_CAPACITY: usize = 1;

/// State shared by every worker of every stage.
pub(crate) struct SyncContext<A> {
    pub gateway: Gateway<A>,
    pub caches: Caches,
    pub settings: SyncSettings,
    pub updates_tx: mpsc::UnboundedSender<TrackedPullRequest>,
}

impl<A: GithubApi> SyncContext<A> {
    pub fn emit(&self, pr: TrackedPullRequest) {
        let _ = self.updates_tx.send(pr);
    }

    pub fn report(&self, what: &str, err: impl std::fmt::Display) {
        error!(error = %err, "{what}");
        self.gateway.status(format!("ERROR: {err}"));
    }

    /// Rescore a cached pull request in place and return the new value.
    pub async fn rescore_cached(&self, key: &str, now: DateTime<Utc>) -> Option<TrackedPullRequest> {
        let profile = &self.settings.profile;
        let rescored = self
            .caches
            .prs
            .update(key, |pr| pr.rescore(profile, now).map(|()| pr.clone()))
            .await?;
        match rescored {
            Ok(pr) => Some(pr),
            Err(e) => {
                warn!(pr = %key, error = %e, "Skipping pull request");
                None
            }
        }
    }

    async fn save_prs(&self) {
        if let Err(e) = self.caches.prs.save().await {
            self.report("Failed to save pull request cache", e);
        }
    }
}

/// Run `handler` over every job received on `rx` with `workers` concurrent
/// workers. The returned handle resolves once the input is closed and every
/// worker has finished.
pub(crate) fn spawn_stage<J, H, Fut>(
    name: &'static str,
    workers: usize,
    rx: mpsc::Receiver<J>,
    handler: H,
) -> JoinHandle<()>
where
    J: Send + 'static,
    H: Fn(J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let rx = Arc::new(Mutex::new(rx));
    let handler = Arc::new(handler);

    let handles: Vec<_> = (0..workers.max(1))
        .map(|worker| {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else { break };
                    handler(job).await;
                }
                debug!(stage = name, worker, "Worker finished");
            })
        })
        .collect();

    tokio::spawn(async move {
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(stage = name, error = %e, "Stage worker panicked");
            }
        }
        debug!(stage = name, "Stage drained");
    })
}

pub(crate) async fn run_cycle<A: GithubApi>(ctx: Arc<SyncContext<A>>) {
    let started = Utc::now();
    let workers = ctx.settings.workers_per_stage;
    info!(workers, "Refresh cycle started");

    let (org_tx, org_rx) = mpsc::channel::<OrgJob>(STAGE_CHANNEL_CAPACITY);
    let (repo_tx, repo_rx) = mpsc::channel::<RepoJob>(STAGE_CHANNEL_CAPACITY);
    let (pre_tx, pre_rx) = mpsc::channel::<RepoJob>(STAGE_CHANNEL_CAPACITY);
    let (pr_tx, pr_rx) = mpsc::channel::<PrJob>(STAGE_CHANNEL_CAPACITY);

    // Downstream first so every send has a consumer.
    let refreshed: Arc<Mutex<HashSet<String>>> = Arc::default();
    let refresh = spawn_stage("refresh", workers, pr_rx, {
        let ctx = Arc::clone(&ctx);
        move |job| {
            let ctx = Arc::clone(&ctx);
            let refreshed = Arc::clone(&refreshed);
            async move { refresh_stage(&ctx, &refreshed, job).await }
        }
    });
    let preprocess = spawn_stage("preprocess", workers, pre_rx, {
        let ctx = Arc::clone(&ctx);
        let pr_tx = pr_tx.clone();
        move |job| {
            let ctx = Arc::clone(&ctx);
            let pr_tx = pr_tx.clone();
            async move { preprocess_stage(&ctx, &pr_tx, job).await }
        }
    });
    let events = spawn_stage("events", workers, repo_rx, {
        let ctx = Arc::clone(&ctx);
        move |job| {
            let ctx = Arc::clone(&ctx);
            let pre_tx = pre_tx.clone();
            async move { events_stage(&ctx, &pre_tx, job).await }
        }
    });
    let orgs = spawn_stage("orgs", workers, org_rx, {
        let ctx = Arc::clone(&ctx);
        let repo_tx = repo_tx.clone();
        move |job| {
            let ctx = Arc::clone(&ctx);
            let repo_tx = repo_tx.clone();
            async move { org_stage(&ctx, &repo_tx, job).await }
        }
    });

    issue_activity(&ctx, &pr_tx, started).await;
    drop(pr_tx);

    dispatch_orgs(&ctx, &org_tx).await;
    drop(org_tx);
    dispatch_public_repos(&ctx, &repo_tx).await;
    drop(repo_tx);

    wait_stage("orgs", orgs).await;
    if let Err(e) = ctx.caches.orgs.save().await {
        ctx.report("Failed to save organization cache", e);
    }
    if let Err(e) = ctx.caches.repos.save().await {
        ctx.report("Failed to save repository cache", e);
    }
    wait_stage("events", events).await;
    wait_stage("preprocess", preprocess).await;
    wait_stage("refresh", refresh).await;

    ctx.gateway.status("");
    info!(
        elapsed_secs = (Utc::now() - started).num_seconds(),
        "Refresh cycle finished"
    );
}

async fn wait_stage(name: &'static str, stage: JoinHandle<()>) {
    if let Err(e) = stage.await {
        error!(stage = name, error = %e, "Stage supervisor failed");
    }
}

/// Pull recently updated issues into the issue cache and turn the pull
/// request activity they reveal into refresh jobs or plain rescoring.
async fn issue_activity<A: GithubApi>(
    ctx: &SyncContext<A>,
    pr_tx: &mpsc::Sender<PrJob>,
    now: DateTime<Utc>,
) {
    let days = ctx.settings.profile.abandoned_age_days;
    let most_recent = ctx
        .caches
        .issues
        .read(|issues| most_recent_activity(issues.values()))
        .await;
    let since = look_back_since(now, days, most_recent);
    debug!(since = %since, "Fetching issues");

    let run = ctx.gateway.list_issues_since(since).await;
    if let Some(e) = &run.error {
        ctx.report("Failed to list issues", e);
    }
    let written = ctx
        .caches
        .issues
        .write(|issues| merge_issues(issues, run.items, now, days))
        .await;
    debug!(written, "Merged issues");
    if let Err(e) = ctx.caches.issues.save().await {
        ctx.report("Failed to save issue cache", e);
    }

    let activities = ctx
        .caches
        .issues
        .read(|issues| {
            issues
                .values()
                .filter_map(|issue| match activity_from_issue(issue) {
                    Ok(a) => Some(a),
                    Err(e) => {
                        warn!(error = %e, "Skipping issue");
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .await;

    let mut rescored = 0;
    for activity in activities {
        if !ctx.settings.tracks(&activity.org, &activity.repo) {
            continue;
        }
        let key = activity.cache_key();
        let (cached_open, current) = ctx
            .caches
            .prs
            .read(|prs| match prs.get(&key) {
                Some(pr) => (
                    pr.is_open(),
                    pr.last_updated_at.is_some_and(|t| t >= activity.updated_at),
                ),
                None => (false, false),
            })
            .await;

        let reason = if activity.closed {
            // nothing to drop unless we still track it as open
            if !cached_open {
                continue;
            }
            RefreshReason::Closed
        } else if current {
            if let Some(pr) = ctx.rescore_cached(&key, now).await {
                ctx.emit(pr);
                rescored += 1;
            }
            continue;
        } else {
            RefreshReason::IssueActivity
        };

        let job = PrJob {
            org: activity.org,
            repo: activity.repo,
            number: activity.number,
            reason,
        };
        if pr_tx.send(job).await.is_err() {
            warn!("Refresh stage closed early");
            break;
        }
    }

    if rescored > 0 {
        ctx.save_prs().await;
    }
}

async fn dispatch_orgs<A: GithubApi>(ctx: &SyncContext<A>, org_tx: &mpsc::Sender<OrgJob>) {
    ctx.gateway.status("fetching orgs...");
    let run = ctx.gateway.list_orgs().await;
    if let Some(e) = &run.error {
        ctx.report("Failed to list organizations", e);
    }

    for org in run.items {
        if !ctx.settings.org_filter.allows(&org.login) {
            debug!(org = %org.login, "Organization filtered out");
            continue;
        }
        if org_tx.send(OrgJob { org: org.login }).await.is_err() {
            break;
        }
    }
}

async fn dispatch_public_repos<A: GithubApi>(ctx: &SyncContext<A>, repo_tx: &mpsc::Sender<RepoJob>) {
    for (org, repo) in &ctx.settings.public_repos {
        let metadata = match ctx.gateway.get_repo(org, repo).await {
            Ok(m) => m,
            Err(e) => {
                ctx.report("Failed to fetch public repository", e);
                continue;
            }
        };
        let job = RepoJob {
            org: org.clone(),
            repo: repo.clone(),
            metadata,
        };
        if repo_tx.send(job).await.is_err() {
            break;
        }
    }
}

async fn org_stage<A: GithubApi>(ctx: &SyncContext<A>, repo_tx: &mpsc::Sender<RepoJob>, job: OrgJob) {
    let OrgJob { org } = job;
    ctx.gateway.status(format!("{org} fetching repos..."));

    let fresh = match ctx.gateway.get_org(&org).await {
        Ok(o) => o,
        Err(e) => {
            ctx.report("Failed to fetch organization", e);
            return;
        }
    };
    let cached_at = ctx.caches.orgs.get(&org).await.and_then(|o| o.updated_at);
    let unchanged = cached_at
        .zip(fresh.updated_at)
        .is_some_and(|(old, new)| new <= old);

    let cached_repos = ctx.caches.repos_for_org(&org).await;
    let repos = if unchanged && !cached_repos.is_empty() {
        debug!(org = %org, count = cached_repos.len(), "Using cached repositories");
        cached_repos
    } else {
        let run = ctx.gateway.list_org_repos(&org).await;
        let complete = run.error.is_none();
        debug!(org = %org, count = run.items.len(), complete, "Listed repositories");
        ctx.caches.put_org_repos(&org, &run.items, complete).await;
        match &run.error {
            // keep the old snapshot so the next cycle lists again
            Some(e) => ctx.report("Failed to list repositories", e),
            None => ctx.caches.orgs.put(org.clone(), fresh).await,
        }
        run.items
    };

    for metadata in repos {
        if metadata.archived || !ctx.settings.repo_allowed(&org, &metadata.name) {
            continue;
        }
        let job = RepoJob {
            org: org.clone(),
            repo: metadata.name.clone(),
            metadata,
        };
        if repo_tx.send(job).await.is_err() {
            break;
        }
    }
}

async fn events_stage<A: GithubApi>(ctx: &SyncContext<A>, pre_tx: &mpsc::Sender<RepoJob>, job: RepoJob) {
    let now = Utc::now();
    let (org, repo) = (job.org.as_str(), job.repo.as_str());
    let key = repo_key(org, repo);

    let cached = ctx.caches.events.get(&key).await.unwrap_or_default();
    let newest = cached.first().map(|e| e.created_at);
    let look_back = days_before(now, ctx.settings.profile.abandoned_age_days);

    let run = ctx
        .gateway
        .list_repo_events(org, repo, newest, look_back)
        .await;
    if let Some(e) = run.error {
        // A partial run is newest first; merging it would leave a gap behind
        // the new head that the next fetch, which stops at that head, never
        // fills. Drop it and retry from the old head next cycle.
        ctx.report("Failed to list repository events", e);
        return;
    }
    let fetched = run.items.len();
    let merged = merge_events(cached, run.items, now);
    debug!(repo = %key, fetched, total = merged.len(), "Merged events");
    ctx.caches.events.put(key.clone(), merged).await;
    if let Err(e) = ctx.caches.events.save().await {
        ctx.report("Failed to save event cache", e);
    }

    // Public repositories never pass through an organization listing.
    if ctx.settings.is_public_repo(org, repo) {
        ctx.caches.put_repo(org, job.metadata.clone()).await;
        if let Err(e) = ctx.caches.repos.save().await {
            ctx.report("Failed to save repository cache", e);
        }
    }

    let _ = pre_tx.send(job).await;
}

async fn preprocess_stage<A: GithubApi>(ctx: &SyncContext<A>, pr_tx: &mpsc::Sender<PrJob>, job: RepoJob) {
    let now = Utc::now();
    let (org, repo) = (job.org.as_str(), job.repo.as_str());

    let events = ctx
        .caches
        .events
        .get(&repo_key(org, repo))
        .await
        .unwrap_or_default();
    let changes = ctx
        .caches
        .prs
        .read(|prs| derive_change_set(&events, |n| prs.get(&pr_key(org, repo, n))))
        .await;
    if changes.is_empty() {
        return;
    }
    debug!(
        org,
        repo,
        unchanged = changes.unchanged.len(),
        refresh = changes.needs_refresh.len(),
        misc = changes.misc_activity.len(),
        closed = changes.closed.len(),
        "Change set"
    );

    for number in &changes.unchanged {
        if let Some(pr) = ctx.rescore_cached(&pr_key(org, repo, *number), now).await {
            ctx.emit(pr);
        }
    }
    if !changes.unchanged.is_empty() {
        ctx.save_prs().await;
    }

    let jobs = changes
        .needs_refresh
        .iter()
        .map(|n| (*n, RefreshReason::Changed))
        .chain(changes.misc_activity.iter().map(|n| (*n, RefreshReason::MiscActivity)))
        .chain(changes.closed.iter().map(|n| (*n, RefreshReason::Closed)));
    for (number, reason) in jobs {
        let job = PrJob {
            org: org.to_string(),
            repo: repo.to_string(),
            number,
            reason,
        };
        if pr_tx.send(job).await.is_err() {
            break;
        }
    }
}

async fn refresh_stage<A: GithubApi>(
    ctx: &SyncContext<A>,
    refreshed: &Mutex<HashSet<String>>,
    job: PrJob,
) {
    let key = job.key();
    if !refreshed.lock().await.insert(key.clone()) {
        debug!(pr = %key, "Already refreshed this cycle");
        return;
    }

    let now = Utc::now();
    let cached = ctx.caches.prs.get(&key).await;
    match refresh_pull_request(&ctx.gateway, cached, &job, now).await {
        Ok(Refreshed::Open(mut pr)) => {
            if let Err(e) = pr.rescore(&ctx.settings.profile, now) {
                warn!(pr = %key, error = %e, "Failed to score pull request");
            }
            ctx.caches.prs.put(key, pr.clone()).await;
            ctx.save_prs().await;
            ctx.emit(pr);
        }
        Ok(Refreshed::Closed(mut pr)) => {
            if let Err(e) = pr.rescore(&ctx.settings.profile, now) {
                warn!(pr = %key, error = %e, "Failed to score pull request");
            }
            if ctx.caches.prs.delete(&key).await.is_some() {
                ctx.save_prs().await;
            }
            let closed_at = pr.remote.as_ref().and_then(|r| r.closed_at).unwrap_or(now);
            let marked = ctx
                .caches
                .issues
                .write(|issues| mark_issue_closed(issues, &key, closed_at))
                .await;
            if marked {
                if let Err(e) = ctx.caches.issues.save().await {
                    ctx.report("Failed to save issue cache", e);
                }
            }
            info!(pr = %key, "Pull request closed");
            ctx.emit(pr);
        }
        Err(e) => ctx.report("Failed to refresh pull request", e),
    }

    ctx.gateway.status("");
}
