//! Startup configuration, stored as TOML under the platform config
//! directory. A default file is written on first run; validation funnels
//! through [`DriveMixer::new`] so bad drive values are rejected before any
//! task spawns.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mixer::{DriveMixer, MixerError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No config directory available on this platform")]
    NoConfigDir,

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Mixer(#[from] MixerError),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub drive: DriveSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub mqtt: MqttSettings,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DriveSettings {
    /// Ceiling of each pulse-width channel.
    pub pwm_max: u16,
    /// Knob deflection, in input units, at which the output saturates.
    pub max_travel_radius: f64,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            pwm_max: 230,
            max_travel_radius: 130.0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct InputSettings {
    pub deadzone: f32,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self { deadzone: 0.05 }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct MqttSettings {
    /// Broker as `host` or `host:port`.
    pub server: String,
    pub user: String,
    pub pw: String,
    pub client_id: String,
    pub command_topic: String,
    pub session_topic: String,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            server: "localhost:1883".to_string(),
            user: String::new(),
            pw: String::new(),
            client_id: "skidjoy".to_string(),
            command_topic: "propeller_cmd".to_string(),
            session_topic: "remote_controlled".to_string(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("skidjoy").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads the config file, writing the defaults first if none exists.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            info!("No config found, writing defaults to {}", path.display());
            let config = Self::default();
            config.save(&path)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&raw)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Builds the validated mixer from the drive section.
    pub fn mixer(&self) -> Result<DriveMixer, ConfigError> {
        DriveMixer::new(self.drive.max_travel_radius, self.drive.pwm_max).map_err(Into::into)
    }
}
