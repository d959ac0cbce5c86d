use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The hourly quota is spent; retry after `reset_at`.
    #[error("GitHub API rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Burst throttle; retry after the server supplied delay.
    #[error("GitHub API secondary rate limit hit, retry after {}s", .retry_after.as_secs())]
    SecondaryRateLimit { retry_after: Duration },

    #[error("GitHub API rejected the token: {0}")]
    Unauthorized(String),

    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    #[error("GitHub API returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("GitHub API request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to parse GitHub response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. } | ApiError::SecondaryRateLimit { .. }
        )
    }
}
