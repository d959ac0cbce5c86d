pub mod auth;
pub mod client;
pub mod error;
pub mod gateway;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use client::GithubClient;
pub use error::ApiError;
pub use gateway::{Gateway, PageRun};
pub use models::*;

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// The slice of the GitHub REST API the sync engine consumes. Paged calls take
/// a 1-based page number; the page size is the implementation's concern.
#[async_trait]
pub trait GithubApi: Send + Sync + 'static {
    async fn list_orgs(&self, page: u32) -> ApiResult<Vec<Organization>>;

    async fn get_org(&self, org: &str) -> ApiResult<Organization>;

    async fn list_org_repos(&self, org: &str, page: u32) -> ApiResult<Vec<Repository>>;

    async fn get_repo(&self, org: &str, repo: &str) -> ApiResult<Repository>;

    async fn get_pull(&self, org: &str, repo: &str, number: u64) -> ApiResult<PullRequest>;

    async fn list_commits(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> ApiResult<Vec<Commit>>;

    async fn list_review_comments(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> ApiResult<Vec<ReviewComment>>;

    async fn list_reviews(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> ApiResult<Vec<Review>>;

    async fn combined_status(&self, org: &str, repo: &str, sha: &str)
    -> ApiResult<CombinedStatus>;

    /// Newest first.
    async fn list_repo_events(&self, org: &str, repo: &str, page: u32) -> ApiResult<Vec<Event>>;

    /// Open issues and pull requests visible to the viewer across all
    /// organizations, updated at or after `since`.
    async fn list_issues_since(&self, since: DateTime<Utc>, page: u32) -> ApiResult<Vec<Issue>>;
}
