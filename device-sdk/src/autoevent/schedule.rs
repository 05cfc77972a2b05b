//! Immutable schedule descriptions.

use std::fmt;
use std::time::Duration;

use crate::config::AutoEventConfig;
use crate::{Error, Result};

/// Identity of a schedule: one timer per (device, resource) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleKey {
    pub device_name: String,
    pub resource_name: String,
}

impl ScheduleKey {
    pub fn new(device_name: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_name, self.resource_name)
    }
}

/// Longest accepted poll interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Parse a human readable poll frequency such as `500ms`, `2s` or `1h 30m`.
///
/// Zero, unparsable and values above [`MAX_INTERVAL`] are configuration errors.
pub fn parse_frequency(frequency: &str) -> Result<Duration> {
    let interval = humantime::parse_duration(frequency.trim()).map_err(|e| {
        Error::config(format!("invalid auto event frequency {:?}: {}", frequency, e))
    })?;

    check_interval(interval).map_err(|e| {
        Error::config(format!("auto event frequency {:?}: {}", frequency, e))
    })
}

fn check_interval(interval: Duration) -> std::result::Result<Duration, String> {
    if interval.is_zero() {
        return Err("interval must be positive".to_string());
    }
    if interval > MAX_INTERVAL {
        return Err(format!(
            "interval {:?} exceeds the maximum of {}",
            interval,
            humantime::format_duration(MAX_INTERVAL)
        ));
    }
    Ok(interval)
}

/// One auto-poll job. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSpec {
    key: ScheduleKey,
    interval: Duration,
    on_change: bool,
}

impl ScheduleSpec {
    pub fn new(
        device_name: impl Into<String>,
        resource_name: impl Into<String>,
        frequency: &str,
        on_change: bool,
    ) -> Result<Self> {
        let interval = parse_frequency(frequency)?;
        Self::with_interval(device_name, resource_name, interval, on_change)
    }

    pub fn with_interval(
        device_name: impl Into<String>,
        resource_name: impl Into<String>,
        interval: Duration,
        on_change: bool,
    ) -> Result<Self> {
        let interval = check_interval(interval)
            .map_err(|e| Error::config(format!("auto event {}", e)))?;

        Ok(Self {
            key: ScheduleKey::new(device_name, resource_name),
            interval,
            on_change,
        })
    }

    pub fn from_auto_event(device_name: &str, auto_event: &AutoEventConfig) -> Result<Self> {
        Self::new(
            device_name,
            auto_event.resource.as_str(),
            &auto_event.frequency,
            auto_event.on_change,
        )
    }

    pub fn key(&self) -> &ScheduleKey {
        &self.key
    }

    pub fn device_name(&self) -> &str {
        &self.key.device_name
    }

    pub fn resource_name(&self) -> &str {
        &self.key.resource_name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn on_change(&self) -> bool {
        self.on_change
    }
}
