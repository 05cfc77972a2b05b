//! SDK configuration.
//!
//! The configuration is a JSON document with four sections:
//! - `service`: publish fan-out limit, ingestion endpoint, timeouts, admin state
//! - `logging`: filter directive and optional log directory
//! - `profiles`: device resources and the commands grouping them
//! - `devices`: device instances and their auto-event schedules
//!
//! Frequencies are kept as the raw strings found in the file. They are parsed
//! when a schedule is registered, so a bad frequency only rejects that one
//! schedule.

use std::path::{Path, PathBuf};
use std::time::Duration;

use device_contracts::ValueType;
use serde::{Deserialize, Serialize};

use crate::service::AdminState;
use crate::{Error, Result};

/// Environment variable naming the config file when none is given on the command line.
pub const CONFIG_PATH_ENV: &str = "DEVICE_SDK_CONFIG";
pub const ASYNC_BUFFER_SIZE_ENV: &str = "DEVICE_SDK_ASYNC_BUFFER_SIZE";
pub const INGESTION_URL_ENV: &str = "DEVICE_SDK_INGESTION_URL";
pub const ADMIN_STATE_ENV: &str = "DEVICE_SDK_ADMIN_STATE";

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LogSettings,
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Service-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Maximum number of publish operations in flight across all schedules.
    #[serde(default = "default_async_buffer_size")]
    pub async_buffer_size: usize,
    /// Base URL of the ingestion service. Events are only logged when unset.
    #[serde(default)]
    pub ingestion_url: Option<String>,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    /// How long shutdown waits for in-flight publishes after executors exit.
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,
    #[serde(default)]
    pub admin_state: AdminState,
}

fn default_service_name() -> String {
    "device-sdk".to_string()
}

fn default_async_buffer_size() -> usize {
    16
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            async_buffer_size: default_async_buffer_size(),
            ingestion_url: None,
            request_timeout: default_request_timeout(),
            shutdown_grace: default_shutdown_grace(),
            admin_state: AdminState::default(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSettings {
    /// Filter directive, e.g. `device_sdk=debug`. `RUST_LOG` wins when set.
    #[serde(default)]
    pub filter: Option<String>,
    /// Directory for daily-rotated log files. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// A device profile: the resources a device exposes and commands grouping them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

impl ProfileConfig {
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn command(&self, name: &str) -> Option<&CommandConfig> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Whether `name` resolves to a resource or a command of this profile.
    pub fn resolves(&self, name: &str) -> bool {
        self.resource(name).is_some() || self.command(name).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandConfig {
    pub name: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub name: String,
    pub profile_name: String,
    #[serde(default)]
    pub auto_events: Vec<AutoEventConfig>,
}

/// One auto-event entry: poll `resource` every `frequency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoEventConfig {
    pub resource: String,
    pub frequency: String,
    #[serde(default)]
    pub on_change: bool,
}

impl SdkConfig {
    /// Load, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ASYNC_BUFFER_SIZE_ENV) {
            self.service.async_buffer_size = raw.trim().parse().map_err(|_| {
                Error::config(format!("{} must be an integer, got {:?}", ASYNC_BUFFER_SIZE_ENV, raw))
            })?;
        }
        if let Some(url) = lookup(INGESTION_URL_ENV) {
            let url = url.trim().to_string();
            self.service.ingestion_url = (!url.is_empty()).then_some(url);
        }
        if let Some(raw) = lookup(ADMIN_STATE_ENV) {
            self.service.admin_state = raw.parse()?;
        }
        Ok(())
    }

    /// Check cross references. Frequencies are checked at registration.
    pub fn validate(&self) -> Result<()> {
        if self.service.async_buffer_size == 0 {
            return Err(Error::config("service.asyncBufferSize must be at least 1"));
        }

        for device in &self.devices {
            let profile = self.profile(&device.profile_name).ok_or_else(|| {
                Error::config(format!(
                    "device {} references unknown profile {}",
                    device.name, device.profile_name
                ))
            })?;

            for auto_event in &device.auto_events {
                if !profile.resolves(&auto_event.resource) {
                    return Err(Error::config(format!(
                        "device {} auto event targets unknown resource {} in profile {}",
                        device.name, auto_event.resource, profile.name
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }
}
