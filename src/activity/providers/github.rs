use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::activity::http::UpstreamRequest;
use crate::activity::types::{FetchError, Repository};

pub const API_URL: &str = "https://api.github.com/repos/";

#[derive(Debug, Deserialize)]
struct RepoPayload {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    pushed_at: DateTime<Utc>,
    forks_count: u64,
    open_issues_count: u64,
    stargazers_count: u64,
    subscribers_count: Option<u64>,
    #[serde(default)]
    watchers_count: u64,
}

/// `slug` is `owner/name`.
pub fn request(slug: &str, token: &str) -> UpstreamRequest {
    UpstreamRequest::get("github", format!("{API_URL}{slug}"))
        .bearer(token)
        .accept("application/vnd.github+json")
}

/// Accepts `owner/name` made of the characters GitHub allows.
pub fn is_valid_slug(slug: &str) -> bool {
    let mut parts = slug.split('/');
    let ok = |p: Option<&str>| {
        p.is_some_and(|s| {
            !s.is_empty()
                && s != "."
                && s != ".."
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        })
    };
    ok(parts.next()) && ok(parts.next()) && parts.next().is_none()
}

pub fn parse_repository(body: &str) -> Result<Repository, FetchError> {
    let p: RepoPayload = serde_json::from_str(body).map_err(FetchError::malformed)?;
    Ok(Repository {
        created: p.created_at,
        updated: p.updated_at,
        pushed: p.pushed_at,
        forks: p.forks_count,
        issues: p.open_issues_count,
        stars: p.stargazers_count,
        // `watchers_count` mirrors stars on the REST API; subscribers are the real watchers.
        watchers: p.subscribers_count.unwrap_or(p.watchers_count),
    })
}
