#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use prsync::github::models::*;
use prsync::github::{ApiError, ApiResult, GithubApi};
use prsync::pr::{TrackedPullRequest, pr_key};

/// In-memory stand-in for the GitHub API. Every list is a single page.
#[derive(Default)]
pub struct FakeGithub {
    pub orgs: Vec<Organization>,
    /// Single-organization endpoint, keyed by login.
    pub org_details: HashMap<String, Organization>,
    /// Keyed by organization login.
    pub repos: HashMap<String, Vec<Repository>>,
    /// Keyed by `org/repo`.
    pub repo_details: HashMap<String, Repository>,
    /// Keyed by `org/repo/number`.
    pub pulls: HashMap<String, PullRequest>,
    pub commits: HashMap<String, Vec<Commit>>,
    pub comments: HashMap<String, Vec<ReviewComment>>,
    pub reviews: HashMap<String, Vec<Review>>,
    /// Keyed by head sha.
    pub statuses: HashMap<String, CombinedStatus>,
    /// Keyed by `org/repo`, newest first.
    pub events: HashMap<String, Vec<Event>>,
    pub issues: Vec<Issue>,

    errors: Mutex<VecDeque<ApiError>>,
    /// Failures aimed at one call label, each consumed once.
    targeted: Mutex<Vec<(String, ApiError)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGithub {
    /// The next call fails with `err`; queued errors are consumed in order.
    pub fn fail_next(&self, err: ApiError) {
        self.errors.lock().unwrap().push_back(err);
    }

    /// The next call labelled `call` (e.g. `list_repo_events acme/gadgets`)
    /// fails with `err`.
    pub fn fail_call(&self, call: &str, err: ApiError) {
        self.targeted.lock().unwrap().push((call.to_string(), err));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split(' ').next() == Some(endpoint))
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn respond<T>(&self, call: String, data: Option<T>) -> ApiResult<T> {
        self.calls.lock().unwrap().push(call.clone());
        if let Some(err) = self.errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        {
            let mut targeted = self.targeted.lock().unwrap();
            if let Some(pos) = targeted.iter().position(|(c, _)| *c == call) {
                return Err(targeted.remove(pos).1);
            }
        }
        let data = data.ok_or(ApiError::NotFound(call))?;
        Ok(ApiResponse {
            data,
            next_page: None,
            rate_limit: Some(RateLimit {
                remaining: 4999,
                limit: 5000,
                reset_at: None,
            }),
        })
    }
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn list_orgs(&self, _page: u32) -> ApiResult<Vec<Organization>> {
        self.respond("list_orgs".into(), Some(self.orgs.clone()))
    }

    async fn get_org(&self, org: &str) -> ApiResult<Organization> {
        self.respond(format!("get_org {org}"), self.org_details.get(org).cloned())
    }

    async fn list_org_repos(&self, org: &str, _page: u32) -> ApiResult<Vec<Repository>> {
        let repos = self.repos.get(org).cloned().unwrap_or_default();
        self.respond(format!("list_org_repos {org}"), Some(repos))
    }

    async fn get_repo(&self, org: &str, repo: &str) -> ApiResult<Repository> {
        let key = format!("{org}/{repo}");
        self.respond(format!("get_repo {key}"), self.repo_details.get(&key).cloned())
    }

    async fn get_pull(&self, org: &str, repo: &str, number: u64) -> ApiResult<PullRequest> {
        let key = pr_key(org, repo, number);
        self.respond(format!("get_pull {key}"), self.pulls.get(&key).cloned())
    }

    async fn list_commits(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        _page: u32,
    ) -> ApiResult<Vec<Commit>> {
        let key = pr_key(org, repo, number);
        let data = self.commits.get(&key).cloned().unwrap_or_default();
        self.respond(format!("list_commits {key}"), Some(data))
    }

    async fn list_review_comments(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        _page: u32,
    ) -> ApiResult<Vec<ReviewComment>> {
        let key = pr_key(org, repo, number);
        let data = self.comments.get(&key).cloned().unwrap_or_default();
        self.respond(format!("list_review_comments {key}"), Some(data))
    }

    async fn list_reviews(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        _page: u32,
    ) -> ApiResult<Vec<Review>> {
        let key = pr_key(org, repo, number);
        let data = self.reviews.get(&key).cloned().unwrap_or_default();
        self.respond(format!("list_reviews {key}"), Some(data))
    }

    async fn combined_status(&self, org: &str, repo: &str, sha: &str) -> ApiResult<CombinedStatus> {
        let status = self.statuses.get(sha).cloned().unwrap_or(CombinedStatus {
            state: "pending".into(),
            sha: sha.to_string(),
            total_count: 0,
        });
        self.respond(format!("combined_status {org}/{repo}@{sha}"), Some(status))
    }

    async fn list_repo_events(&self, org: &str, repo: &str, _page: u32) -> ApiResult<Vec<Event>> {
        let key = format!("{org}/{repo}");
        let data = self.events.get(&key).cloned().unwrap_or_default();
        self.respond(format!("list_repo_events {key}"), Some(data))
    }

    async fn list_issues_since(&self, since: DateTime<Utc>, _page: u32) -> ApiResult<Vec<Issue>> {
        let data = self
            .issues
            .iter()
            .filter(|i| i.updated_at >= since)
            .cloned()
            .collect();
        self.respond("list_issues_since".into(), Some(data))
    }
}

// Builders

pub fn ago(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - Duration::hours(hours)
}

pub fn user(login: &str) -> User {
    User {
        login: login.to_string(),
    }
}

pub fn pull(number: u64, author: &str, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> PullRequest {
    PullRequest {
        number,
        node_id: format!("PR_{number}"),
        state: "open".into(),
        title: format!("Change #{number}"),
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        user: Some(user(author)),
        draft: false,
        created_at,
        updated_at,
        closed_at: None,
        head: GitRef {
            sha: format!("sha-{number}"),
        },
        labels: Vec::new(),
        requested_reviewers: Vec::new(),
        additions: 0,
        deletions: 0,
        commits: 1,
        comments: 0,
        review_comments: 0,
        mergeable: Some(true),
    }
}

pub fn commit(sha: &str, at: DateTime<Utc>) -> Commit {
    Commit {
        sha: sha.to_string(),
        commit: CommitDetail {
            committer: Some(CommitSignature { date: Some(at) }),
        },
    }
}

pub fn comment(id: u64, author: &str, at: DateTime<Utc>) -> ReviewComment {
    ReviewComment {
        id,
        user: Some(user(author)),
        created_at: at,
        body: "looks good".into(),
    }
}

pub fn success(sha: &str) -> CombinedStatus {
    CombinedStatus {
        state: "success".into(),
        sha: sha.to_string(),
        total_count: 1,
    }
}

pub fn repo(org: &str, name: &str) -> Repository {
    Repository {
        name: name.to_string(),
        full_name: format!("{org}/{name}"),
        owner: user(org),
        html_url: format!("https://github.com/{org}/{name}"),
        archived: false,
        updated_at: None,
        pushed_at: None,
    }
}

pub fn org(login: &str, updated_at: DateTime<Utc>) -> Organization {
    Organization {
        login: login.to_string(),
        id: 1,
        updated_at: Some(updated_at),
    }
}

pub fn pr_issue(org: &str, repo: &str, number: u64, updated_at: DateTime<Utc>) -> Issue {
    Issue {
        number,
        title: format!("Change #{number}"),
        state: "open".into(),
        updated_at,
        closed_at: None,
        html_url: format!("https://github.com/{org}/{repo}/pull/{number}"),
        pull_request: Some(IssuePullLinks {
            html_url: Some(format!("https://github.com/{org}/{repo}/pull/{number}")),
        }),
        repository: None,
    }
}

pub fn event(id: &str, kind: &str, created_at: DateTime<Utc>, payload: serde_json::Value) -> Event {
    Event {
        id: id.to_string(),
        kind: kind.to_string(),
        created_at,
        payload,
    }
}

pub fn pr_event(id: &str, action: &str, number: u64, created_at: DateTime<Utc>) -> Event {
    event(
        id,
        "PullRequestEvent",
        created_at,
        json!({ "action": action, "pull_request": { "number": number } }),
    )
}

pub fn review_event(id: &str, number: u64, created_at: DateTime<Utc>) -> Event {
    event(
        id,
        "PullRequestReviewEvent",
        created_at,
        json!({ "action": "created", "pull_request": { "number": number } }),
    )
}

pub fn comment_event(id: &str, number: u64, closed: bool, created_at: DateTime<Utc>) -> Event {
    let closed_at = closed.then(|| created_at.to_rfc3339());
    event(
        id,
        "IssueCommentEvent",
        created_at,
        json!({
            "action": "created",
            "issue": {
                "number": number,
                "closed_at": closed_at,
                "pull_request": { "url": format!("https://api.github.com/pulls/{number}") },
            },
        }),
    )
}

/// A comment on a plain issue, which carries no `pull_request` link.
pub fn plain_issue_comment_event(id: &str, number: u64, created_at: DateTime<Utc>) -> Event {
    event(
        id,
        "IssueCommentEvent",
        created_at,
        json!({ "action": "created", "issue": { "number": number, "closed_at": null } }),
    )
}

/// A cached pull request whose content was last fetched at `fetched_at`.
pub fn tracked(org: &str, repo: &str, remote: PullRequest, fetched_at: DateTime<Utc>) -> TrackedPullRequest {
    let mut pr = TrackedPullRequest::shallow(org, repo, remote.number);
    pr.remote = Some(remote);
    pr.last_updated_at = Some(fetched_at);
    pr
}
