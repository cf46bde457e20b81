//! Configuration management for obs-deck
//!
//! Also serves as the persisted connection details: the last endpoint and
//! password used are kept here so the next run can connect without asking.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::obs::Endpoint;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// OBS WebSocket connection
    #[serde(default)]
    pub obs: ObsConfig,

    /// Poll loop cadence
    #[serde(default)]
    pub polling: PollingConfig,

    /// Preview screenshot parameters
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Source-record preparation
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsConfig {
    /// obs-websocket endpoint, `ws://host:port`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// obs-websocket password (optional, stored in plain text)
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between preview refreshes (ms)
    #[serde(default = "default_preview_interval")]
    pub preview_interval_ms: u64,

    /// Delay between record status refreshes (ms)
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Image format requested from OBS
    #[serde(default = "default_preview_format")]
    pub format: String,

    #[serde(default = "default_preview_width")]
    pub width: u32,

    #[serde(default = "default_preview_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Filter kind that owns a per-source recording output
    #[serde(default = "default_record_filter_kind")]
    pub filter_kind: String,

    /// Directory pattern prepended to the entity name in output filenames
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,
}

// Default value functions
fn default_endpoint() -> String {
    "ws://127.0.0.1:4455".to_string()
}

fn default_preview_interval() -> u64 {
    33 // ~30 Hz
}

fn default_status_interval() -> u64 {
    1000
}

fn default_preview_format() -> String {
    "png".to_string()
}

fn default_preview_width() -> u32 {
    1920 / 4
}

fn default_preview_height() -> u32 {
    1080 / 4
}

fn default_record_filter_kind() -> String {
    "source_record_filter".to_string()
}

fn default_filename_pattern() -> String {
    "%CCYY-%MM-%DD %I %mm %ss %p".to_string()
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            password: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            preview_interval_ms: default_preview_interval(),
            status_interval_ms: default_status_interval(),
        }
    }
}

impl PollingConfig {
    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            format: default_preview_format(),
            width: default_preview_width(),
            height: default_preview_height(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            filter_kind: default_record_filter_kind(),
            filename_pattern: default_filename_pattern(),
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path()?)
    }

    /// Load configuration from `config_path`, creating it if missing
    pub fn load_from(config_path: PathBuf) -> Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            config.config_path = Some(config_path);
            Ok(config)
        } else {
            // Create default config
            let config = Config {
                config_path: Some(config_path),
                ..Config::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "obs-deck", "obs-deck")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Parsed endpoint
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.obs.endpoint).context("Invalid OBS endpoint in config")
    }

    /// Persist new connection details after the user supplied them
    pub fn remember_connection(&mut self, endpoint: &Endpoint, password: Option<&str>) -> Result<()> {
        self.obs.endpoint = endpoint.to_string();
        self.obs.password = password.filter(|p| !p.is_empty()).map(str::to_owned);
        self.save()
    }

    /// Discard stored connection details
    pub fn forget_connection(&mut self) -> Result<()> {
        self.obs = ObsConfig::default();
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("obs-deck-test-{}-{}", name, uuid::Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.polling.preview_interval(), Duration::from_millis(33));
        assert_eq!(config.polling.status_interval(), Duration::from_millis(1000));
        assert_eq!((config.preview.width, config.preview.height), (480, 270));
        assert_eq!(config.endpoint().unwrap().port, 4455);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [obs]
            endpoint = "ws://studio:4460"

            [polling]
            status_interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.obs.endpoint, "ws://studio:4460");
        assert_eq!(config.obs.password, None);
        assert_eq!(config.polling.status_interval_ms, 500);
        assert_eq!(config.polling.preview_interval_ms, 33);
        assert_eq!(config.recording.filter_kind, "source_record_filter");
    }

    #[test]
    fn test_remember_and_forget_connection() {
        let path = temp_config_path("remember");
        let mut config = Config::load_from(path.clone()).unwrap();
        assert!(path.exists());

        let endpoint = Endpoint::parse("ws://10.0.0.5:4455").unwrap();
        config.remember_connection(&endpoint, Some("hunter2")).unwrap();

        let reloaded = Config::load_from(path.clone()).unwrap();
        assert_eq!(reloaded.obs.endpoint, "ws://10.0.0.5:4455");
        assert_eq!(reloaded.obs.password.as_deref(), Some("hunter2"));

        config.forget_connection().unwrap();
        let reloaded = Config::load_from(path.clone()).unwrap();
        assert_eq!(reloaded.obs.endpoint, default_endpoint());
        assert_eq!(reloaded.obs.password, None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
