use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coordinates::StoreCoordinates;
use crate::errors::ConfigError;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Production,
    Development,
}

impl Preset {
    pub fn coordinates(&self, refresh_interval_minutes: i64) -> StoreCoordinates {
        match self {
            Preset::Production => StoreCoordinates::production(refresh_interval_minutes),
            Preset::Development => StoreCoordinates::development(refresh_interval_minutes),
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Preset::Production),
            "development" | "dev" => Ok(Preset::Development),
            other => Err(ConfigError::InvalidValue(format!("unknown preset {other}"))),
        }
    }
}

/// Everything needed to build a store, plus where each value came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreSettings {
    pub coordinates: StoreCoordinates,
    pub fetch_timeout_secs: u64,
    pub provenance: BTreeMap<String, SettingsProvenance>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from_preset(Preset::default())
    }
}

impl StoreSettings {
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            coordinates: preset.coordinates(0),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            provenance: BTreeMap::new(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn set_provenance(&mut self, path: &str, source: SettingsSource) {
        self.provenance.insert(
            path.to_string(),
            SettingsProvenance {
                path: path.to_string(),
                source,
            },
        );
    }

    pub fn source_of(&self, path: &str) -> Option<SettingsSource> {
        self.provenance.get(path).map(|entry| entry.source)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettingsProvenance {
    pub path: String,
    pub source: SettingsSource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SettingsSource {
    Builtin,
    File,
    Env,
    Cli,
}
