use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use regostore_policy_store::{logging_sink, RegoStoreBuilder, MAX_REFRESH_INTERVAL_MINUTES};
use tracing::{info, warn};

use crate::cli::{load_cli_settings, GlobalSettingsArgs};

/// Used when neither the flag nor the settings give a positive interval.
const DEFAULT_WATCH_INTERVAL_MINUTES: i64 = 10;

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    /// Minutes between refresh cycles; overrides settings
    #[arg(long, value_name = "MINUTES")]
    pub interval_minutes: Option<i64>,
}

pub async fn cmd_watch(
    args: WatchArgs,
    config: Option<&Path>,
    global: &GlobalSettingsArgs,
) -> Result<()> {
    let mut settings = load_cli_settings(config, global)?;
    let interval = match args.interval_minutes {
        Some(minutes) => minutes,
        None if settings.coordinates.refresh_interval_minutes > 0 => {
            settings.coordinates.refresh_interval_minutes
        }
        None => DEFAULT_WATCH_INTERVAL_MINUTES,
    };
    if interval <= 0 {
        bail!("Watch needs a positive refresh interval, got {interval}");
    }
    if interval > MAX_REFRESH_INTERVAL_MINUTES {
        bail!("Refresh interval {interval} exceeds {MAX_REFRESH_INTERVAL_MINUTES} minutes");
    }
    settings.coordinates.refresh_interval_minutes = interval;

    let (store, first) = RegoStoreBuilder::from_settings(&settings)
        .with_error_sink(logging_sink())
        .start()
        .await;
    match first {
        Ok(generation) => info!(generation, "initial fetch published"),
        Err(err) => warn!(error = %err, "initial fetch failed; will retry on schedule"),
    }
    info!(
        root = %store.resolved_source().root,
        interval_minutes = interval,
        "watching for policy updates (Ctrl+C to stop)"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    store.stop_watching();
    info!("watch stopped");

    let metrics = store.metrics().snapshot();
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
