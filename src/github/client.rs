use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::error::ApiError;
use super::models::*;
use super::{ApiResult, GithubApi};

const DEFAULT_SECONDARY_RETRY: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
    token: String,
    per_page: u32,
}

impl GithubClient {
    pub fn new(token: &str, api_url: &str, per_page: u32) -> Result<Self> {
        if !api_url.starts_with("https://") {
            bail!("GitHub API URL must use HTTPS: {}", api_url);
        }

        let client = Client::builder()
            .user_agent("prsync")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            per_page: per_page.clamp(1, 100),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let url = format!("{}{}", self.api_url, path);
        debug!(url = %url, "GET");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let rate_limit = rate_limit_from_headers(&headers);

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &headers, text, path));
        }

        let next_page = headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_from_link);

        let data: T = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("{path}: {e}")))?;

        Ok(ApiResponse {
            data,
            next_page,
            rate_limit,
        })
    }

    fn paged(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", self.per_page.to_string()),
            ("page", page.max(1).to_string()),
        ]
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn list_orgs(&self, page: u32) -> ApiResult<Vec<Organization>> {
        self.get("/user/orgs", &self.paged(page)).await
    }

    async fn get_org(&self, org: &str) -> ApiResult<Organization> {
        self.get(&format!("/orgs/{org}"), &[]).await
    }

    async fn list_org_repos(&self, org: &str, page: u32) -> ApiResult<Vec<Repository>> {
        let mut query = self.paged(page);
        query.push(("type", "all".to_string()));
        query.push(("sort", "updated".to_string()));
        query.push(("direction", "desc".to_string()));
        self.get(&format!("/orgs/{org}/repos"), &query).await
    }

    async fn get_repo(&self, org: &str, repo: &str) -> ApiResult<Repository> {
        self.get(&format!("/repos/{org}/{repo}"), &[]).await
    }

    async fn get_pull(&self, org: &str, repo: &str, number: u64) -> ApiResult<PullRequest> {
        self.get(&format!("/repos/{org}/{repo}/pulls/{number}"), &[])
            .await
    }

    async fn list_commits(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> ApiResult<Vec<Commit>> {
        self.get(
            &format!("/repos/{org}/{repo}/pulls/{number}/commits"),
            &self.paged(page),
        )
        .await
    }

    async fn list_review_comments(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> ApiResult<Vec<ReviewComment>> {
        self.get(
            &format!("/repos/{org}/{repo}/pulls/{number}/comments"),
            &self.paged(page),
        )
        .await
    }

    async fn list_reviews(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> ApiResult<Vec<Review>> {
        self.get(
            &format!("/repos/{org}/{repo}/pulls/{number}/reviews"),
            &self.paged(page),
        )
        .await
    }

    async fn combined_status(
        &self,
        org: &str,
        repo: &str,
        sha: &str,
    ) -> ApiResult<CombinedStatus> {
        self.get(
            &format!("/repos/{org}/{repo}/commits/{sha}/status"),
            &self.paged(1),
        )
        .await
    }

    async fn list_repo_events(&self, org: &str, repo: &str, page: u32) -> ApiResult<Vec<Event>> {
        self.get(&format!("/repos/{org}/{repo}/events"), &self.paged(page))
            .await
    }

    async fn list_issues_since(&self, since: DateTime<Utc>, page: u32) -> ApiResult<Vec<Issue>> {
        let mut query = self.paged(page);
        query.push(("filter", "all".to_string()));
        query.push(("state", "open".to_string()));
        query.push(("sort", "updated".to_string()));
        query.push(("since", since.to_rfc3339()));
        self.get("/issues", &query).await
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimit> {
    let remaining = header_u64(headers, "x-ratelimit-remaining")?;
    let limit = header_u64(headers, "x-ratelimit-limit").unwrap_or(0);
    let reset_at = header_u64(headers, "x-ratelimit-reset")
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Some(RateLimit {
        remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
        limit: u32::try_from(limit).unwrap_or(u32::MAX),
        reset_at,
    })
}

/// Map a failed response onto the error taxonomy. Primary and secondary rate
/// limits must stay distinguishable since they back off differently.
pub fn classify_error(status: StatusCode, headers: &HeaderMap, body: String, path: &str) -> ApiError {
    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
            let reset_at = rate_limit_from_headers(headers)
                .and_then(|rl| rl.reset_at)
                .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(60));
            return ApiError::RateLimited { reset_at };
        }

        if let Some(secs) = header_u64(headers, RETRY_AFTER.as_str()) {
            return ApiError::SecondaryRateLimit {
                retry_after: Duration::from_secs(secs),
            };
        }

        if body.to_lowercase().contains("secondary rate limit") {
            return ApiError::SecondaryRateLimit {
                retry_after: DEFAULT_SECONDARY_RETRY,
            };
        }
    }

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(body),
        StatusCode::NOT_FOUND => ApiError::NotFound(path.to_string()),
        _ => ApiError::Http {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Extract the `page` parameter of the `rel="next"` entry of a `Link` header.
pub fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim() == r#"rel="next""#);
        if !is_next {
            return None;
        }
        let url = Url::parse(target.trim_start_matches('<').trim_end_matches('>')).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}
