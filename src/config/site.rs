// src/config/site.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SITE_CONFIG_PATH: &str = "config/site.toml";
pub const ENV_SITE_CONFIG_PATH: &str = "SITE_CONFIG_PATH";

pub const ENV_LASTFM_API_KEY: &str = "LASTFM_API_KEY";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

fn default_lastfm_username() -> String {
    "I4ROVI".to_string()
}
fn default_letterboxd_username() -> String {
    "14rovi".to_string()
}
fn default_http_timeout_secs() -> u64 {
    5
}
fn default_songs_ttl_secs() -> u64 {
    60
}
fn default_hours_ttl_secs() -> u64 {
    3600
}
fn default_user_agent() -> String {
    concat!("portfolio-site/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Runtime configuration. Secrets are never read from the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default = "default_lastfm_username")]
    pub lastfm_username: String,
    #[serde(default = "default_letterboxd_username")]
    pub letterboxd_username: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_songs_ttl_secs")]
    pub songs_ttl_secs: u64,
    #[serde(default = "default_hours_ttl_secs")]
    pub films_ttl_secs: u64,
    #[serde(default = "default_hours_ttl_secs")]
    pub repository_ttl_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(skip)]
    pub lastfm_api_key: Option<String>,
    #[serde(skip)]
    pub github_token: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            lastfm_username: default_lastfm_username(),
            letterboxd_username: default_letterboxd_username(),
            http_timeout_secs: default_http_timeout_secs(),
            songs_ttl_secs: default_songs_ttl_secs(),
            films_ttl_secs: default_hours_ttl_secs(),
            repository_ttl_secs: default_hours_ttl_secs(),
            user_agent: default_user_agent(),
            lastfm_api_key: None,
            github_token: None,
        }
    }
}

impl SiteConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: SiteConfig = toml::from_str(s).context("parsing site config toml")?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading site config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Resolution order:
    /// 1) $SITE_CONFIG_PATH (must exist)
    /// 2) config/site.toml
    /// 3) built-in defaults
    ///
    /// Environment overrides apply on top in every case.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SITE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("SITE_CONFIG_PATH points to non-existent path"));
            }
        }
        let default_p = PathBuf::from(DEFAULT_SITE_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Pull secrets and username/timeout overrides from the environment.
    pub fn apply_env(&mut self) {
        self.lastfm_api_key = non_empty_env(ENV_LASTFM_API_KEY);
        self.github_token = non_empty_env(ENV_GITHUB_TOKEN);

        if let Some(u) = non_empty_env("LASTFM_USERNAME") {
            self.lastfm_username = u;
        }
        if let Some(u) = non_empty_env("LETTERBOXD_USERNAME") {
            self.letterboxd_username = u;
        }
        if let Some(secs) = non_empty_env("HTTP_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            self.http_timeout_secs = secs;
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        self.lastfm_username = self.lastfm_username.trim().to_string();
        self.letterboxd_username = self.letterboxd_username.trim().to_string();
        if self.http_timeout_secs == 0 {
            self.http_timeout_secs = default_http_timeout_secs();
        }
        if self.songs_ttl_secs == 0 {
            self.songs_ttl_secs = default_songs_ttl_secs();
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_defaults_and_keeps_the_rest() {
        let cfg = SiteConfig::from_toml_str(
            r#"
lastfm_username = "  listener  "
films_ttl_secs = 7200
http_timeout_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(cfg.lastfm_username, "listener");
        assert_eq!(cfg.letterboxd_username, default_letterboxd_username());
        assert_eq!(cfg.films_ttl_secs, 7200);
        assert_eq!(cfg.songs_ttl_secs, 60);
        assert_eq!(cfg.http_timeout_secs, 5);
        assert!(cfg.lastfm_api_key.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(SiteConfig::from_toml_str("lastfm_api_key = \"leak\"").is_err());
    }
}
