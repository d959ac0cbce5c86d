use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub login: String,
    #[serde(default)]
    pub id: u64,
    /// Only present on the single-organization endpoint.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub owner: User,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GitRef {
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Remote pull request snapshot. The list endpoint omits the counters and the
/// diff size, so everything past the identity fields defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub node_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub head: GitRef,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub requested_reviewers: Vec<User>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub commits: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub review_comments: u64,
    #[serde(default)]
    pub mergeable: Option<bool>,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    pub fn author(&self) -> &str {
        self.user.as_ref().map_or("ghost", |u| u.login.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSignature {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub committer: Option<CommitSignature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub commit: CommitDetail,
}

impl Commit {
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit.committer.as_ref().and_then(|c| c.date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    #[serde(default)]
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedStatus {
    pub state: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuePullLinks {
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRepository {
    pub name: String,
    #[serde(default)]
    pub owner: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    /// Present only when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<IssuePullLinks>,
    #[serde(default)]
    pub repository: Option<IssueRepository>,
}

impl Issue {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some() || self.state == "closed"
    }
}

/// Repository activity event. The payload is kept raw so the persisted event
/// log round-trips exactly; typed access goes through [`Event::parse_payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRef {
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Only set when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<Value>,
}

impl IssueRef {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    PullRequest { action: String, pull_request: PullRef },
    Review { pull_request: PullRef },
    ReviewComment { pull_request: PullRef },
    IssueComment { issue: IssueRef },
    Issue { issue: IssueRef },
    Other,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    #[serde(default)]
    action: String,
    pull_request: PullRef,
}

#[derive(Deserialize)]
struct PullRefPayload {
    pull_request: PullRef,
}

#[derive(Deserialize)]
struct IssuePayload {
    issue: IssueRef,
}

impl Event {
    pub fn parse_payload(&self) -> Result<EventPayload, serde_json::Error> {
        let payload = self.payload.clone();
        Ok(match self.kind.as_str() {
            "PullRequestEvent" => {
                let p: PullRequestPayload = serde_json::from_value(payload)?;
                EventPayload::PullRequest {
                    action: p.action,
                    pull_request: p.pull_request,
                }
            }
            "PullRequestReviewEvent" => {
                let p: PullRefPayload = serde_json::from_value(payload)?;
                EventPayload::Review {
                    pull_request: p.pull_request,
                }
            }
            "PullRequestReviewCommentEvent" => {
                let p: PullRefPayload = serde_json::from_value(payload)?;
                EventPayload::ReviewComment {
                    pull_request: p.pull_request,
                }
            }
            "IssueCommentEvent" => {
                let p: IssuePayload = serde_json::from_value(payload)?;
                EventPayload::IssueComment { issue: p.issue }
            }
            // The repository events API names this `IssuesEvent`.
            "IssuesEvent" | "IssueEvent" => {
                let p: IssuePayload = serde_json::from_value(payload)?;
                EventPayload::Issue { issue: p.issue }
            }
            _ => EventPayload::Other,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RateLimit {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

/// One decoded response plus the paging and quota metadata from its headers.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub next_page: Option<u32>,
    pub rate_limit: Option<RateLimit>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            next_page: None,
            rate_limit: None,
        }
    }
}
