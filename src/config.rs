//! Configuration module
//!
//! Loaded from a TOML file. Every field has a default, so a partial file
//! (or none at all) yields a usable station.
//!
//! ```toml
//! [station]
//! id = "CP001"
//! connectors = 2
//!
//! [server]
//! url = "ws://localhost:9000/ocpp"
//! heartbeat_interval = 300
//!
//! [meter_values]
//! format = "simple"
//! auto_interval = 10
//! auto_value = 100
//!
//! [logging]
//! level = "debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::station::{AutoMeterValueSetting, DEFAULT_HEARTBEAT_INTERVAL_SECS};
use crate::domain::{BootPayload, MeterValueFormat};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "OCPP_STATION_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub station: StationConfig,
    pub server: ServerConfig,
    pub meter_values: MeterValuesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub id: String,
    pub connectors: u32,
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            id: "CP001".to_string(),
            connectors: 1,
            vendor: "Texnouz".to_string(),
            model: "Virtual Station".to_string(),
            serial_number: None,
            firmware_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Central System endpoint; the station id is appended to it
    pub url: String,
    /// HTTP Basic auth password, empty for none
    pub password: String,
    /// Heartbeat period (seconds) when the Central System gives none
    pub heartbeat_interval: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9000/ocpp".to_string(),
            password: String::new(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterValuesConfig {
    pub format: MeterValueFormat,
    /// Seconds between automatic meter values during a transaction, 0 = off
    pub auto_interval: u64,
    /// Wh added per automatic meter value
    pub auto_value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Read and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.station.id.trim().is_empty() {
            return Err(ConfigError::Invalid("station.id must not be empty".into()));
        }
        if self.station.connectors == 0 {
            return Err(ConfigError::Invalid(
                "station.connectors must be at least 1".into(),
            ));
        }
        if !self.server.url.starts_with("ws://") && !self.server.url.starts_with("wss://") {
            return Err(ConfigError::Invalid(format!(
                "server.url must be a ws:// or wss:// URL, got {}",
                self.server.url
            )));
        }
        Ok(())
    }

    pub fn boot_payload(&self) -> BootPayload {
        let mut payload = BootPayload::new(&self.station.vendor, &self.station.model);
        payload.serial_number = self.station.serial_number.clone();
        payload.firmware_version = self.station.firmware_version.clone();
        payload
    }

    /// Auto meter value setting, `None` unless both interval and value are set
    pub fn auto_meter_value(&self) -> Option<AutoMeterValueSetting> {
        let setting = AutoMeterValueSetting {
            interval: self.meter_values.auto_interval,
            value: self.meter_values.auto_value,
        };
        setting.is_enabled().then_some(setting)
    }

    pub fn password(&self) -> Option<String> {
        Some(self.server.password.clone()).filter(|p| !p.is_empty())
    }
}

/// `$OCPP_STATION_CONFIG`, else `<config dir>/ocpp-station/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocpp-station")
        .join("config.toml")
}
