use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::SiteConfig;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the configured cache windows.
    pub fn init(config: &SiteConfig) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        // Static gauges with the absolute TTLs (no sliding refresh)
        gauge!("activity_cache_ttl_secs", "cache" => "songs").set(config.songs_ttl_secs as f64);
        gauge!("activity_cache_ttl_secs", "cache" => "films").set(config.films_ttl_secs as f64);
        gauge!("activity_cache_ttl_secs", "cache" => "repositories")
            .set(config.repository_ttl_secs as f64);
        gauge!("activity_cache_ttl_secs", "cache" => "images").set(config.films_ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
