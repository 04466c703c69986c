use crate::error::AppError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, looked up in the working directory
pub const CONFIG_FILE: &str = "propflow.toml";

/// Application configuration (`propflow.toml` + environment overrides)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// REST base URL including the version prefix
    pub api_base_url: String,
    /// WebSocket base URL; derived from `api_base_url` when unset
    pub ws_base_url: Option<String>,
    /// Directory holding the database and captured photos
    pub data_dir: PathBuf,
    pub reconnect_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Photos geotagged farther than this from the pinned location are flagged
    pub max_photo_distance_km: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            ws_base_url: None,
            data_dir: PathBuf::from("./data"),
            reconnect_delay_secs: 5,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            max_photo_distance_km: 0.5,
        }
    }
}

impl AppConfig {
    /// Loads `path` if it exists (defaults otherwise), then applies environment overrides
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let config = Self::from_toml(&raw)?;
            log::info!("Loaded configuration from {}", path.display());
            config
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        if let Some(url) = var("PROPFLOW_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = var("PROPFLOW_WS_BASE_URL") {
            self.ws_base_url = Some(url);
        }
        if let Some(dir) = var("PROPFLOW_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// WebSocket base: explicit value, or the API base with `http` swapped for `ws`
    pub fn ws_base_url(&self) -> String {
        match &self.ws_base_url {
            Some(url) => url.clone(),
            None => self.api_base_url.replacen("http", "ws", 1),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("propflow.db")
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.data_dir.join("captures")
    }

    pub fn api_config(&self) -> property_api::ApiConfig {
        property_api::ApiConfig {
            base_url: self.api_base_url.clone(),
            timeout_secs: self.request_timeout_secs,
            connect_timeout_secs: self.connect_timeout_secs,
            ..property_api::ApiConfig::default()
        }
    }

    pub fn live_channel_config(&self) -> live_channel::LiveChannelConfig {
        live_channel::LiveChannelConfig {
            ws_base_url: self.ws_base_url(),
            reconnect_delay: self.reconnect_delay(),
        }
    }
}
