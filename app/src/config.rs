use std::{fs, path::Path};

use serde::Deserialize;

use height_transformer::ServiceConfig;

/// Settings read from the optional `--config` JSON file. Command line flags take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub las: LasDefaults,
}

/// Header values used when assembling a LAS file from CSV.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LasDefaults {
    pub version: String,
    pub scale: [f64; 3],
    pub software_id: String,
    pub system_id: String,
}

impl Default for LasDefaults {
    fn default() -> Self {
        Self {
            version: "1.2".to_string(),
            scale: [0.0001; 3],
            software_id: concat!("lascsv ", env!("CARGO_PKG_VERSION")).to_string(),
            system_id: "OTHER".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                let config = serde_json::from_str(&text)?;
                log::info!("loaded config from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }
}
