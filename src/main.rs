use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use twbot::config::Settings;
use twbot::core::engine::ActionEngine;
use twbot::core::runtime::{install_signal_handler, Runtime};
use twbot::memory::JsonFileStore;
use twbot::pacing::{SystemClock, SystemRandom};
use twbot::providers::dry_run::DryRunClient;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let settings = Settings::from_env().context("invalid configuration")?;

    let default_filter = if settings.debug { "twbot=debug" } else { "twbot=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    info!("=== Starting twbot ===");
    info!(debug = settings.debug, queries = settings.retweet_queries.len(), "settings loaded");

    let shutdown = tokio_util::sync::CancellationToken::new();
    let clock = Arc::new(SystemClock);
    let engine = ActionEngine::open(
        Arc::new(DryRunClient::new("twbot")),
        Arc::new(JsonFileStore::new()),
        clock.clone(),
        Arc::new(SystemRandom),
        settings.engine_options(),
        shutdown.clone(),
    )
    .context("failed to open snapshots")?;
    let runtime = Runtime::new(Arc::new(engine), clock);
    install_signal_handler(shutdown);

    runtime
        .run_once("reconcile", |engine| async move { engine.reconcile_all().await })
        .await
        .context("initial reconciliation failed")?;

    if !settings.retweet_queries.is_empty() {
        let queries = settings.retweet_queries.clone();
        let banned = settings.banned.clone();
        runtime.spawn_periodic("retweet", settings.retweet_every, move |engine| {
            let queries = queries.clone();
            let banned = banned.clone();
            async move { engine.retweet_once(&queries, &banned).await }
        });
    }

    if let Some(follow) = settings.follow.clone() {
        runtime.spawn("follow-followers", move |engine| async move {
            engine.follow_followers(&follow.query, follow.max_pages, None).await
        });
    }

    if settings.auto_unfollow {
        runtime.spawn("unfollow-all", |engine| async move { engine.unfollow_all(None).await });
    }

    runtime.wait().await?;
    info!("=== twbot stopped ===");
    Ok(())
}
