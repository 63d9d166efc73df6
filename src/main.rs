//! Feed Client - command line probe
//!
//! Logs in (when no session is stored), reads the first feed page twice and
//! reports cache statistics. Useful for checking a backend deployment.

use std::env;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_client::models::FeedQuery;
use feed_client::{Config, FeedClient};

/// Main entry point for the feed client probe.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the session (credential file + cache)
/// 4. Log in with `FEED_USERNAME` / `FEED_PASSWORD` if not authenticated
/// 5. Fetch feed page 1 twice; the second read is served from cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: api_url={}, default_ttl={}ms, feed_ttl={}ms",
        config.api_url, config.default_cache_ttl_ms, config.feed_cache_ttl_ms
    );

    let client = FeedClient::new(&config)
        .await
        .context("failed to open feed client session")?;

    if !client.auth().is_authenticated().await {
        let username = env::var("FEED_USERNAME").context("FEED_USERNAME is not set")?;
        let password = env::var("FEED_PASSWORD").context("FEED_PASSWORD is not set")?;
        let user = client.auth().login(&username, &password).await?;
        info!("Logged in as {}", user.username);
    } else if let Some(user) = client.auth().current_user().await {
        info!("Resuming session of {}", user.username);
    }

    for attempt in 1..=2 {
        match client.posts().get_all_posts(FeedQuery::default()).await {
            Ok(page) => info!(
                "Feed read {}: {} posts, has_more={}",
                attempt,
                page.posts.len(),
                page.has_more
            ),
            Err(err) if err.is_reauthentication() => {
                warn!("Session expired; run again with FEED_USERNAME and FEED_PASSWORD");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }

    let stats = client.cache_stats().await;
    info!(
        "Cache: hits={}, misses={}, entries={}, hit_rate={:.2}",
        stats.hits,
        stats.misses,
        stats.total_entries,
        stats.hit_rate()
    );
    Ok(())
}
