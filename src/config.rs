use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigFileError};
use crate::presets::MaterialClassifier;
use crate::types::MaterialConfig;

pub const CONFIG_VERSION: &str = "1";

/// Persisted per-material settings and unit prices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub materials: BTreeMap<String, MaterialConfig>,
    #[serde(default)]
    pub prices: BTreeMap<String, f64>,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

impl ConfigFile {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Default::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = serde_json::from_str(&data)?;
        tracing::info!(
            path = %path.as_ref().display(),
            materials = config.materials.len(),
            prices = config.prices.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), data)?;
        Ok(())
    }

    /// Adds a classifier default for every listed material without a config.
    pub fn fill_defaults<'a>(
        &mut self,
        materials: impl IntoIterator<Item = &'a str>,
        classifier: &dyn MaterialClassifier,
    ) {
        for name in materials {
            if !self.materials.contains_key(name) {
                tracing::debug!(material = name, "using classifier default config");
                self.materials.insert(name.to_string(), classifier.classify(name));
            }
        }
    }
}

/// Checks the settings that are not covered by stock length generation.
pub fn validate(config: &MaterialConfig) -> Result<(), ConfigError> {
    if config.valorization_rate.is_nan() || config.valorization_rate < 0.0 {
        return Err(ConfigError::NegativeRate {
            field: "valorization_rate",
            value: config.valorization_rate,
        });
    }
    if config.min_waste_rate.is_nan() || config.min_waste_rate < 0.0 {
        return Err(ConfigError::NegativeRate {
            field: "min_waste_rate",
            value: config.min_waste_rate,
        });
    }
    Ok(())
}
