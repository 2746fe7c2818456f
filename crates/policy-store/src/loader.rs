use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::coordinates::MAX_REFRESH_INTERVAL_MINUTES;
use crate::errors::ConfigError;
use crate::model::{Preset, SettingsSource, StoreSettings};

const ENV_PREFIX: &str = "REGO_STORE__";
const ENV_JSON: &str = "REGO_STORE_OVERRIDE_JSON";
const PRESET_KEY: &str = "preset";

const BUILTIN_KEYS: [&str; 8] = [
    "base_location",
    "owner",
    "repository",
    "path",
    "tag",
    "branch",
    "refresh_interval_minutes",
    "fetch_timeout_secs",
];

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
    /// `key=value` pairs from the command line, applied last.
    pub cli_overrides: Vec<(String, String)>,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
            cli_overrides: Vec::new(),
        }
    }

    pub fn cli_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.cli_overrides.push((key.into(), value.into()));
        self
    }
}

pub fn load_settings(path: Option<&Path>) -> Result<StoreSettings, ConfigError> {
    let mut options = LoadOptions::default();
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    options.include_env = true;
    load_settings_with_options(&options)
}

/// Preset, then files, then env, then CLI. A `preset` key anywhere in the
/// cascade selects the base coordinates before any other key is applied.
pub fn load_settings_with_options(options: &LoadOptions) -> Result<StoreSettings, ConfigError> {
    let mut overlays = Vec::new();
    for path in &options.paths {
        if path.exists() {
            overlays.extend(overlays_from_file(path)?);
        }
    }
    if options.include_env {
        overlays.extend(overlays_from_env()?);
    }
    for (key, raw) in &options.cli_overrides {
        overlays.push(SettingsOverlay {
            path: normalize_key(key),
            value: parse_env_value(raw.trim()),
            source: SettingsSource::Cli,
        });
    }

    let mut preset = Preset::default();
    let mut preset_source = SettingsSource::Builtin;
    for overlay in overlays.iter().filter(|overlay| overlay.path == PRESET_KEY) {
        preset = to_string_value(&overlay.value)?.parse()?;
        preset_source = overlay.source;
    }

    let mut settings = StoreSettings::from_preset(preset);
    for key in BUILTIN_KEYS {
        settings.set_provenance(key, SettingsSource::Builtin);
    }
    settings.set_provenance(PRESET_KEY, preset_source);

    for overlay in overlays {
        if overlay.path == PRESET_KEY {
            continue;
        }
        apply_override_to_settings(&mut settings, &overlay.path, &overlay.value, overlay.source)?;
    }
    Ok(settings)
}

struct SettingsOverlay {
    path: String,
    value: Value,
    source: SettingsSource,
}

pub(crate) fn apply_override_to_settings(
    settings: &mut StoreSettings,
    path: &str,
    value: &Value,
    source: SettingsSource,
) -> Result<(), ConfigError> {
    let coordinates = &mut settings.coordinates;
    match path {
        "base_location" => coordinates.base_location = to_string_value(value)?,
        "owner" => coordinates.owner = to_string_value(value)?,
        "repository" => coordinates.repository = to_string_value(value)?,
        "path" => coordinates.path = to_string_value(value)?,
        "tag" => coordinates.tag = to_string_value(value)?,
        "branch" => coordinates.branch = to_string_value(value)?,
        "refresh_interval_minutes" => {
            coordinates.refresh_interval_minutes = to_refresh_interval(value)?
        }
        "fetch_timeout_secs" => settings.fetch_timeout_secs = to_u64(value)?,
        path => return Err(ConfigError::UnsupportedPath(path.to_string())),
    }
    settings.set_provenance(path, source);
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<SettingsOverlay>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(format!("{}", err)))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| ConfigError::Invalid(format!("{}", err)))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| ConfigError::Invalid(format!("{}", err)))?;
    flatten_top_level(json_value, SettingsSource::File)
}

fn overlays_from_env() -> Result<Vec<SettingsOverlay>, ConfigError> {
    let mut overlays = Vec::new();
    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| ConfigError::Invalid(format!("{}", err)))?;
            overlays.extend(flatten_top_level(json_value, SettingsSource::Env)?);
        }
    }

    let mut vars: Vec<(String, String)> = env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect();
    vars.sort();
    for (key, raw) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = normalize_key(stripped);
        if path.is_empty() {
            continue;
        }
        overlays.push(SettingsOverlay {
            path,
            value: parse_env_value(&raw),
            source: SettingsSource::Env,
        });
    }
    Ok(overlays)
}

fn flatten_top_level(
    value: Value,
    source: SettingsSource,
) -> Result<Vec<SettingsOverlay>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| SettingsOverlay {
                path: normalize_key(&key),
                value,
                source,
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(ConfigError::Invalid(format!(
            "expected a mapping at the top level, got {other}"
        ))),
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace('-', "_")
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    if let Ok(parsed @ Value::String(_)) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn to_string_value(value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(ConfigError::InvalidValue(format!(
            "expected string, got {other}"
        ))),
    }
}

fn to_i64(value: &Value) -> Result<i64, ConfigError> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|raw| raw.trim().parse().ok()))
        .ok_or_else(|| ConfigError::InvalidValue(format!("expected integer, got {value}")))
}

fn to_refresh_interval(value: &Value) -> Result<i64, ConfigError> {
    let minutes = to_i64(value)?;
    if minutes > MAX_REFRESH_INTERVAL_MINUTES {
        return Err(ConfigError::InvalidValue(format!(
            "refresh_interval_minutes {minutes} exceeds {MAX_REFRESH_INTERVAL_MINUTES}"
        )));
    }
    Ok(minutes)
}

fn to_u64(value: &Value) -> Result<u64, ConfigError> {
    to_i64(value).and_then(|v| {
        u64::try_from(v)
            .map_err(|_| ConfigError::InvalidValue(format!("value {v} must not be negative")))
    })
}
