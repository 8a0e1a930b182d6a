//! One-off probe of the upstream feeds: prints the normalized activity as JSON.
//!
//! Usage: `activity_probe [owner/repo]`

use portfolio_site::{build_activity, internet_time::internet_time_now, SiteConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let activity = build_activity(SiteConfig::load_default()?)?;

    let songs = activity.latest_songs(3).await;
    let films = activity.latest_films(3).await;
    let repo = match std::env::args().nth(1) {
        Some(slug) => activity.repository(&slug).await,
        None => None,
    };

    let out = serde_json::json!({
        "beats": internet_time_now(),
        "songs": songs,
        "films": films,
        "repository": repo,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
