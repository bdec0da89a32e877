use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Where the station list comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Backend serving `/api/stations` and the MJPEG endpoints.
    /// Relative `mjpeg_url` values are resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Local TOML station file; used instead of the backend when it exists.
    /// Defaults to `$XDG_CONFIG_HOME/feedwall/stations.toml`.
    #[serde(default = "default_stations_toml")]
    pub stations_toml: PathBuf,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Delay between a transport failure and the automatic reconnect.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// A stream that has not produced a complete frame by then counts as failed.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Suspend every stream of the open station while the terminal is unfocused.
    #[serde(default = "default_suspend_on_focus_loss")]
    pub suspend_on_focus_loss: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stations_toml: default_stations_toml(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            load_timeout_ms: default_load_timeout_ms(),
        }
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            suspend_on_focus_loss: default_suspend_on_focus_loss(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl StreamConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_stations_toml() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

fn default_request_timeout_ms() -> u64 {
    8000
}

fn default_retry_delay_ms() -> u64 {
    4000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_load_timeout_ms() -> u64 {
    15000
}

fn default_suspend_on_focus_loss() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8991
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.stream.retry_delay(), Duration::from_millis(4000));
        assert!(config.visibility.suspend_on_focus_loss);
        assert!(!config.http.enabled);
        assert!(config.source.base_url.starts_with("http://"));
        assert!(config
            .source
            .stations_toml
            .ends_with("feedwall/stations.toml"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [source]
            base_url = "http://cams.local:9000"

            [stream]
            retry_delay_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.source.base_url, "http://cams.local:9000");
        assert_eq!(config.stream.retry_delay_ms, 1500);
        assert_eq!(config.stream.load_timeout_ms, 15000);
        assert_eq!(config.http.port, 8991);
    }
}
