pub mod config;
pub mod fetch;
pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use regostore_policy_store::{load_settings_with_options, LoadOptions, StoreSettings};
use tracing::{debug, warn};

/// Settings flags shared by every subcommand.
#[derive(Args, Clone, Debug, Default)]
pub struct GlobalSettingsArgs {
    /// Coordinates preset (production or development)
    #[arg(long, global = true)]
    pub preset: Option<String>,

    /// Override a settings key, e.g. `--set tag=v1.2.3` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", global = true, value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// File, then `REGO_STORE__*` env, then `--preset` and `--set` flags.
pub fn load_cli_settings(config: Option<&Path>, args: &GlobalSettingsArgs) -> Result<StoreSettings> {
    let mut options = LoadOptions {
        include_env: true,
        ..Default::default()
    };
    if let Some(path) = config {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "settings file not found; using preset and environment only"
            );
        }
        options.paths.push(path.to_path_buf());
    }
    if let Some(preset) = &args.preset {
        options = options.cli_override("preset", preset.as_str());
    }
    for (key, value) in &args.overrides {
        options = options.cli_override(key.as_str(), value.as_str());
    }

    let settings = load_settings_with_options(&options).context("Failed to load settings")?;
    debug!(
        base = %settings.coordinates.base_location,
        tag = %settings.coordinates.tag,
        interval = settings.coordinates.refresh_interval_minutes,
        "settings resolved"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::parse_key_value;

    #[test]
    fn parses_key_value_pairs() {
        assert_eq!(
            parse_key_value("tag=v1.2.3").unwrap(),
            ("tag".to_string(), "v1.2.3".to_string())
        );
        assert_eq!(
            parse_key_value("path=").unwrap(),
            ("path".to_string(), String::new())
        );
        assert!(parse_key_value("tag").is_err());
        assert!(parse_key_value("=v1").is_err());
    }
}
