//! Configuration module for api-monitor.
//!
//! Server settings come from environment variables with sensible defaults.
//! The monitored endpoints, report format and notification rules come from a
//! YAML file.

use serde::{Deserialize, Serialize};
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::notify::{LogSink, NotificationPolicy, NotificationSink, Notifier};
use crate::probe::EndpointSpec;
use crate::report::ReportFormat;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("configuration must contain an 'apis' section")]
    MissingEndpoints,
    #[error("endpoint list cannot be empty")]
    NoEndpoints,
    #[error("endpoint '{name}': {reason}")]
    InvalidEndpoint { name: String, reason: String },
    #[error("duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the dashboard (default: 8080)
    pub http_port: u16,
    /// Config file used when none is given on the command line (default: "config.yaml")
    pub config_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            config_path: PathBuf::from("config.yaml"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `API_MONITOR_HTTP_PORT`: dashboard port (default: 8080)
    /// - `API_MONITOR_CONFIG`: config file path (default: "config.yaml")
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("API_MONITOR_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(path) = env::var("API_MONITOR_CONFIG") {
            cfg.config_path = PathBuf::from(path);
        }

        cfg
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout() -> f64 {
    5.0
}

fn default_expected_status() -> u16 {
    200
}

fn default_true() -> bool {
    true
}

/// One endpoint as written in the config file or sent to the dashboard API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub name: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl EndpointEntry {
    /// Validate and convert into an [`EndpointSpec`].
    pub fn into_spec(self) -> Result<EndpointSpec, ConfigError> {
        let name = self.name.trim().to_string();
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name must be a non-empty string"));
        }

        let url = self.url.trim();
        if url.is_empty() {
            return Err(invalid("URL must be a non-empty string"));
        }

        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err(invalid("timeout must be a positive number"));
        }
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .map_err(|_| invalid("timeout is too large"))?;

        if !(100..600).contains(&self.expected_status) {
            return Err(invalid("expected_status must be a valid HTTP status (100-599)"));
        }

        let method = self.method.trim().to_ascii_uppercase();
        if method.is_empty() || reqwest::Method::from_bytes(method.as_bytes()).is_err() {
            return Err(invalid("method must be a valid HTTP method"));
        }

        for (key, value) in &self.headers {
            if HeaderName::from_bytes(key.as_bytes()).is_err() {
                return Err(invalid(&format!("invalid header name '{}'", key)));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(invalid(&format!("invalid value for header '{}'", key)));
            }
        }

        Ok(EndpointSpec {
            url: url.to_string(),
            method,
            timeout,
            expected_status: self.expected_status,
            headers: self.headers,
            name,
        })
    }
}

impl From<&EndpointSpec> for EndpointEntry {
    fn from(spec: &EndpointSpec) -> Self {
        Self {
            name: spec.name.clone(),
            url: spec.url.clone(),
            method: spec.method.clone(),
            timeout: spec.timeout.as_secs_f64(),
            expected_status: spec.expected_status,
            headers: spec.headers.clone(),
        }
    }
}

/// On/off switch for a notification channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    #[serde(default)]
    pub enabled: bool,
}

/// Notification rules and channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub notify_on_failure: bool,
    #[serde(default = "default_true")]
    pub notify_on_recovery: bool,
    #[serde(default)]
    pub notify_on_all_failures: bool,
    #[serde(default)]
    pub push: ChannelSettings,
    #[serde(default)]
    pub email: ChannelSettings,
}

impl NotificationSettings {
    pub fn policy(&self) -> NotificationPolicy {
        NotificationPolicy {
            on_failure: self.notify_on_failure,
            on_recovery: self.notify_on_recovery,
            on_every_failure: self.notify_on_all_failures,
        }
    }

    /// Build the notifier for these settings.
    ///
    /// Returns `None` when no channel is enabled. `dashboard` receives push
    /// alerts alongside the log.
    pub fn notifier(&self, dashboard: Option<Arc<dyn NotificationSink>>) -> Option<Notifier> {
        if !self.push.enabled && !self.email.enabled {
            return None;
        }

        let mut notifier = Notifier::new(self.policy());
        if self.email.enabled {
            tracing::warn!("Email notifications are not supported, ignoring");
        }
        if self.push.enabled {
            notifier = notifier.with_sink(Arc::new(LogSink));
            if let Some(dashboard) = dashboard {
                notifier = notifier.with_sink(dashboard);
            }
        }

        Some(notifier)
    }
}

/// Config file layout.
#[derive(Debug, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default, alias = "endpoints")]
    apis: Option<Vec<EndpointEntry>>,
    #[serde(default)]
    output_format: ReportFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notifications: Option<NotificationSettings>,
}

/// Validated monitoring configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub endpoints: Vec<EndpointSpec>,
    pub output_format: ReportFormat,
    pub log_file: Option<PathBuf>,
    /// Seconds between cycles; absent or zero means a single run.
    pub interval: Option<u64>,
    pub notifications: Option<NotificationSettings>,
}

impl MonitorConfig {
    /// Load and validate a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::MissingEndpoints);
        }

        let raw: RawConfig = serde_yaml::from_str(content)?;
        let entries = raw.apis.ok_or(ConfigError::MissingEndpoints)?;
        if entries.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(entries.len());
        for entry in entries {
            let spec = entry.into_spec()?;
            if !seen.insert(spec.name.clone()) {
                return Err(ConfigError::DuplicateEndpoint(spec.name));
            }
            endpoints.push(spec);
        }

        Ok(Self {
            endpoints,
            output_format: raw.output_format,
            log_file: raw.log_file,
            interval: raw.interval,
            notifications: raw.notifications,
        })
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let raw = RawConfig {
            apis: Some(self.endpoints.iter().map(EndpointEntry::from).collect()),
            output_format: self.output_format,
            log_file: self.log_file.clone(),
            interval: self.interval,
            notifications: self.notifications.clone(),
        };
        Ok(serde_yaml::to_string(&raw)?)
    }

    /// Write the config back to disk as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured interval, treating zero as unset.
    pub fn interval(&self) -> Option<Duration> {
        self.interval.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// A loaded config file that endpoint edits are written back to.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
    base: MonitorConfig,
}

impl ConfigFile {
    pub fn new(path: PathBuf, base: MonitorConfig) -> Self {
        Self { path, base }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the file with `endpoints` replacing the configured list.
    pub fn save_endpoints(&self, endpoints: &[EndpointSpec]) -> Result<(), ConfigError> {
        let mut config = self.base.clone();
        config.endpoints = endpoints.to_vec();
        config.save(&self.path)?;
        tracing::info!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}
