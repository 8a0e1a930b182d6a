// src/activity/types.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Latest scrobbled track, normalized from the Last.fm payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Song {
    pub title: String,
    pub artist: String,
    pub cover: Option<String>, // "large" image variant
    pub date: Option<i64>,     // unix millis; None while playing
    pub playing: bool,
    pub url: String,
}

/// Diary entry from the Letterboxd RSS feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Film {
    pub title: String,
    pub year: i32,
    pub url: String,
    pub date: NaiveDate,
    pub rating: Option<f32>, // 0.5 ..= 5.0
    pub rewatch: bool,
    pub poster: Option<String>,
}

/// Flattened GitHub repository metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repository {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub pushed: DateTime<Utc>,
    pub forks: u64,
    pub issues: u64,
    pub stars: u64,
    pub watchers: u64,
}

/// Why an upstream fetch did not produce a value.
///
/// Never crosses the public fetchers: they log it and degrade to an
/// empty list or `None`.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("missing configuration: {0}")]
    Config(&'static str),
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Config(_) => "config",
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Malformed(_) => "malformed",
        }
    }

    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        FetchError::Malformed(err.to_string())
    }
}
