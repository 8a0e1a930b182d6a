// src/activity/mod.rs
//! Latest-activity ingestion: Last.fm scrobbles, Letterboxd diary, GitHub
//! repository stats. Each operation is cached and never fails visibly; the
//! `try_*` variants expose the typed error for the HTTP layer.

pub mod http;
pub mod providers;
pub mod types;

use std::sync::Arc;

use chrono::Duration;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::activity::http::HttpFetch;
use crate::activity::providers::{github, lastfm, letterboxd};
use crate::activity::types::{FetchError, Film, Repository, Song};
use crate::cache::{Clock, TtlCache};
use crate::config::SiteConfig;
use crate::widget::image::try_embed_image;

const MAX_TTL_SECS: u64 = 30 * 24 * 3600;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "upstream_requests_total",
            "Requests sent to Last.fm, Letterboxd, GitHub and image hosts."
        );
        describe_counter!(
            "upstream_errors_total",
            "Upstream fetches that degraded to an empty result."
        );
        describe_counter!("activity_cache_hits_total", "Activity cache hits.");
        describe_counter!(
            "activity_cache_misses_total",
            "Activity cache misses (upstream fetch attempted)."
        );
    });
}

pub struct Activity {
    config: SiteConfig,
    http: Arc<dyn HttpFetch>,
    clock: Arc<dyn Clock>,
    songs: TtlCache<Vec<Song>>,
    films: TtlCache<Vec<Film>>,
    repositories: TtlCache<Repository>,
    images: TtlCache<String>,
}

impl Activity {
    pub fn new(config: SiteConfig, http: Arc<dyn HttpFetch>, clock: Arc<dyn Clock>) -> Self {
        ensure_metrics_described();
        let secs = |s: u64| Duration::seconds(s.min(MAX_TTL_SECS) as i64);
        Self {
            songs: TtlCache::new("songs", secs(config.songs_ttl_secs), clock.clone()),
            films: TtlCache::new("films", secs(config.films_ttl_secs), clock.clone()),
            repositories: TtlCache::new(
                "repositories",
                secs(config.repository_ttl_secs),
                clock.clone(),
            ),
            // Cover and poster URLs are content-addressed upstream.
            images: TtlCache::new("images", secs(config.films_ttl_secs), clock.clone()),
            config,
            http,
            clock,
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Most recent songs, newest first. Empty on any failure.
    pub async fn latest_songs(&self, limit: usize) -> Vec<Song> {
        self.try_latest_songs(limit)
            .await
            .unwrap_or_else(|e| degrade("lastfm", e))
    }

    pub async fn try_latest_songs(&self, limit: usize) -> Result<Vec<Song>, FetchError> {
        let limit = limit.max(1);
        self.songs
            .get_or_try_fetch(&limit.to_string(), || self.fetch_songs(limit))
            .await
    }

    /// Most recent diary entries, newest first. Empty on any failure.
    pub async fn latest_films(&self, limit: usize) -> Vec<Film> {
        self.try_latest_films(limit)
            .await
            .unwrap_or_else(|e| degrade("letterboxd", e))
    }

    pub async fn try_latest_films(&self, limit: usize) -> Result<Vec<Film>, FetchError> {
        let limit = limit.max(1);
        self.films
            .get_or_try_fetch(&limit.to_string(), || self.fetch_films(limit))
            .await
    }

    /// Repository stats for `owner/name`. `None` on any failure.
    pub async fn repository(&self, slug: &str) -> Option<Repository> {
        match self.try_repository(slug).await {
            Ok(repo) => Some(repo),
            Err(e) => degrade("github", e),
        }
    }

    pub async fn try_repository(&self, slug: &str) -> Result<Repository, FetchError> {
        if !github::is_valid_slug(slug) {
            return Err(FetchError::Malformed(format!("invalid repository slug {slug:?}")));
        }
        self.repositories
            .get_or_try_fetch(slug, || self.fetch_repository(slug))
            .await
    }

    /// Image at `url` inlined as a `data:` URI, cached per URL. `None` on
    /// any failure; widgets then draw a placeholder.
    pub async fn image_data_uri(&self, url: &str) -> Option<String> {
        let fetched = self
            .images
            .get_or_try_fetch(url, || try_embed_image(self.http.as_ref(), url))
            .await;
        match fetched {
            Ok(uri) => Some(uri),
            Err(e) => degrade("image", e),
        }
    }

    async fn fetch_songs(&self, limit: usize) -> Result<Vec<Song>, FetchError> {
        let key = self
            .config
            .lastfm_api_key
            .as_deref()
            .ok_or(FetchError::Config("LASTFM_API_KEY"))?;
        let req = lastfm::request(&self.config.lastfm_username, key, limit);
        let resp = self.http.get(&req).await?.error_for_status()?;
        let now_ms = self.clock.now().timestamp_millis();
        lastfm::parse_recent_tracks(resp.text()?, now_ms, limit)
    }

    async fn fetch_films(&self, limit: usize) -> Result<Vec<Film>, FetchError> {
        let req = letterboxd::request(&self.config.letterboxd_username);
        let resp = self.http.get(&req).await?.error_for_status()?;
        letterboxd::parse_feed(resp.text()?, limit)
    }

    async fn fetch_repository(&self, slug: &str) -> Result<Repository, FetchError> {
        let token = self
            .config
            .github_token
            .as_deref()
            .ok_or(FetchError::Config("GITHUB_TOKEN"))?;
        let req = github::request(slug, token);
        let resp = self.http.get(&req).await?.error_for_status()?;
        github::parse_repository(resp.text()?)
    }
}

/// Log and swallow a fetch error at the public boundary.
fn degrade<T: Default>(source: &'static str, err: FetchError) -> T {
    tracing::warn!(error = %err, kind = err.kind(), source, "upstream fetch degraded");
    counter!("upstream_errors_total", "source" => source, "kind" => err.kind()).increment(1);
    T::default()
}
