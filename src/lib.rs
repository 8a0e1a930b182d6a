// src/lib.rs
// Public library surface for integration tests (and the probe binary).

pub mod activity;
pub mod api;
pub mod cache;
pub mod config;
pub mod format;
pub mod internet_time;
pub mod metrics;
pub mod widget;

use std::sync::Arc;

use axum::Router;
use tracing::info;

pub use crate::activity::types::{FetchError, Film, Repository, Song};
pub use crate::activity::Activity;
pub use crate::api::create_router as router;
pub use crate::config::SiteConfig;

use crate::activity::http::ReqwestFetch;
use crate::api::AppState;
use crate::cache::SystemClock;

/// Production `Activity`: reqwest transport and the wall clock.
pub fn build_activity(config: SiteConfig) -> anyhow::Result<Activity> {
    let http = ReqwestFetch::new(&config.user_agent, config.http_timeout())?;
    if config.lastfm_api_key.is_none() {
        tracing::warn!("LASTFM_API_KEY not set; song activity will be empty");
    }
    if config.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN not set; repository stats will be empty");
    }
    Ok(Activity::new(config, Arc::new(http), Arc::new(SystemClock)))
}

/// Build the full in-process router (without `/metrics`).
pub fn app(config: SiteConfig) -> anyhow::Result<Router> {
    let activity = build_activity(config)?;
    info!(
        lastfm_user = %activity.config().lastfm_username,
        letterboxd_user = %activity.config().letterboxd_username,
        "activity service ready"
    );
    Ok(router(AppState::new(activity)))
}
