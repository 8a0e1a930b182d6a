//! Portfolio site backend: binary entrypoint.
//! Boots the Axum HTTP server, wiring routes, shared state, and metrics.

use anyhow::Context;
use portfolio_site::{metrics::Metrics, SiteConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact fmt logs filtered by `RUST_LOG` (default `portfolio_site=info,warn`).
/// Uses `try_init` so a subscriber installed by the runtime is left alone.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_site=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = SiteConfig::load_default().context("loading site config")?;
    let metrics = Metrics::init(&config).context("installing prometheus recorder")?;

    let router = portfolio_site::app(config)?.merge(metrics.router());

    Ok(router.into())
}
