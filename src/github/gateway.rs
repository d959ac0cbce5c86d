//! Rate-limit aware access to the remote API.
//!
//! Every remote call goes through [`Gateway::call`], which sleeps through
//! primary and secondary rate limits and publishes the remaining quota after
//! each success. List endpoints additionally go through [`Gateway::paginate`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::ApiError;
use super::models::*;
use super::{ApiResult, GithubApi};

/// Result of a page loop. On a non rate-limit failure the pages gathered so
/// far are kept next to the error.
#[derive(Debug)]
pub struct PageRun<T> {
    pub items: Vec<T>,
    pub last_page: u32,
    pub error: Option<ApiError>,
}

impl<T> PageRun<T> {
    pub fn into_result(self) -> Result<(Vec<T>, u32), ApiError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok((self.items, self.last_page)),
        }
    }
}

pub struct Gateway<A> {
    api: Arc<A>,
    status_tx: mpsc::UnboundedSender<String>,
    quota_tx: mpsc::UnboundedSender<RateLimit>,
}

impl<A: GithubApi> Gateway<A> {
    pub fn new(
        api: Arc<A>,
        status_tx: mpsc::UnboundedSender<String>,
        quota_tx: mpsc::UnboundedSender<RateLimit>,
    ) -> Self {
        Self {
            api,
            status_tx,
            quota_tx,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Publish human-readable progress; an empty string clears it.
    pub fn status(&self, msg: impl Into<String>) {
        let _ = self.status_tx.send(msg.into());
    }

    /// Issue one request, retrying it for as long as the API answers with a
    /// rate-limit error.
    pub async fn call<T, F, Fut>(&self, label: &str, mut request: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        loop {
            match request().await {
                Ok(resp) => {
                    if let Some(rl) = &resp.rate_limit {
                        let _ = self.quota_tx.send(rl.clone());
                    }
                    return Ok(resp);
                }
                Err(ApiError::RateLimited { reset_at }) => {
                    let wait = until(reset_at);
                    warn!(label, wait_secs = wait.as_secs(), "Hit rate limit");
                    self.status(format!(
                        "hit rate limit, waiting {:02}m",
                        (wait.as_secs() + 30) / 60
                    ));
                    tokio::time::sleep(wait).await;
                }
                Err(ApiError::SecondaryRateLimit { retry_after }) => {
                    warn!(
                        label,
                        wait_secs = retry_after.as_secs(),
                        "Hit secondary rate limit"
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(e) => {
                    debug!(label, error = %e, "Request failed");
                    return Err(e);
                }
            }
        }
    }

    /// Walk pages starting at page 1 until the API reports no next page, the
    /// cursor stops advancing, or `stop` says the latest page is far enough.
    pub async fn paginate<T, F, Fut, S>(&self, label: &str, mut fetch: F, stop: S) -> PageRun<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ApiResult<Vec<T>>>,
        S: Fn(&[T]) -> bool,
    {
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let resp = match self.call(label, || fetch(page)).await {
                Ok(resp) => resp,
                Err(e) => {
                    return PageRun {
                        items,
                        last_page: page,
                        error: Some(e),
                    };
                }
            };

            let done = stop(&resp.data);
            debug!(label, page, count = resp.data.len(), "Fetched page");
            items.extend(resp.data);

            match resp.next_page {
                Some(next) if next > page && !done => page = next,
                _ => break,
            }
        }

        PageRun {
            items,
            last_page: page,
            error: None,
        }
    }

    pub async fn list_orgs(&self) -> PageRun<Organization> {
        self.paginate("orgs", |p| self.api.list_orgs(p), |_| false)
            .await
    }

    pub async fn get_org(&self, org: &str) -> Result<Organization, ApiError> {
        self.call("org", || self.api.get_org(org))
            .await
            .map(|r| r.data)
    }

    pub async fn list_org_repos(&self, org: &str) -> PageRun<Repository> {
        self.paginate("repos", |p| self.api.list_org_repos(org, p), |_| false)
            .await
    }

    pub async fn get_repo(&self, org: &str, repo: &str) -> Result<Repository, ApiError> {
        self.call("repo", || self.api.get_repo(org, repo))
            .await
            .map(|r| r.data)
    }

    pub async fn get_pull(&self, org: &str, repo: &str, number: u64) -> Result<PullRequest, ApiError> {
        self.call("pull", || self.api.get_pull(org, repo, number))
            .await
            .map(|r| r.data)
    }

    pub async fn list_commits(&self, org: &str, repo: &str, number: u64) -> PageRun<Commit> {
        self.paginate(
            "commits",
            |p| self.api.list_commits(org, repo, number, p),
            |_| false,
        )
        .await
    }

    pub async fn list_review_comments(
        &self,
        org: &str,
        repo: &str,
        number: u64,
    ) -> PageRun<ReviewComment> {
        self.paginate(
            "comments",
            |p| self.api.list_review_comments(org, repo, number, p),
            |_| false,
        )
        .await
    }

    pub async fn list_reviews(&self, org: &str, repo: &str, number: u64) -> PageRun<Review> {
        self.paginate(
            "reviews",
            |p| self.api.list_reviews(org, repo, number, p),
            |_| false,
        )
        .await
    }

    pub async fn combined_status(
        &self,
        org: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CombinedStatus, ApiError> {
        self.call("status", || self.api.combined_status(org, repo, sha))
            .await
            .map(|r| r.data)
    }

    /// Events newer than `newest_cached`, paging back no further than
    /// `look_back`. Events arrive newest first, so the last event of a page
    /// is the oldest seen so far.
    pub async fn list_repo_events(
        &self,
        org: &str,
        repo: &str,
        newest_cached: Option<DateTime<Utc>>,
        look_back: DateTime<Utc>,
    ) -> PageRun<Event> {
        self.paginate(
            "events",
            |p| self.api.list_repo_events(org, repo, p),
            |page: &[Event]| match page.last() {
                Some(oldest) => {
                    newest_cached.is_some_and(|t| oldest.created_at < t)
                        || oldest.created_at < look_back
                }
                None => true,
            },
        )
        .await
    }

    pub async fn list_issues_since(&self, since: DateTime<Utc>) -> PageRun<Issue> {
        self.paginate(
            "issues",
            |p| self.api.list_issues_since(since, p),
            |_| false,
        )
        .await
    }
}

fn until(reset_at: DateTime<Utc>) -> Duration {
    (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
