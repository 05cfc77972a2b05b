use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use device_contracts::{Event, ReadingValue};
use tracing::debug;

use super::{CommandRequest, ProtocolDriver};
use crate::autoevent::ReadGateway;
use crate::config::{DeviceConfig, ProfileConfig, SdkConfig};
use crate::{Error, Result};

/// [`ReadGateway`] resolving names through device profiles and reading them
/// with a [`ProtocolDriver`].
///
/// A command name expands to every resource it lists; a resource name reads
/// that single resource. A read either yields all of its readings or fails.
pub struct DriverReadGateway {
    driver: Arc<dyn ProtocolDriver>,
    devices: HashMap<String, DeviceConfig>,
    profiles: HashMap<String, ProfileConfig>,
}

impl DriverReadGateway {
    pub fn new(driver: Arc<dyn ProtocolDriver>, config: &SdkConfig) -> Self {
        Self {
            driver,
            devices: config
                .devices
                .iter()
                .map(|d| (d.name.clone(), d.clone()))
                .collect(),
            profiles: config
                .profiles
                .iter()
                .map(|p| (p.name.clone(), p.clone()))
                .collect(),
        }
    }

    /// Resolve `source_name` of `device_name` into driver requests.
    pub fn resolve(
        &self,
        device_name: &str,
        source_name: &str,
    ) -> Result<(&ProfileConfig, Vec<CommandRequest>)> {
        let device = self
            .devices
            .get(device_name)
            .ok_or_else(|| Error::not_found("device", device_name))?;
        let profile = self
            .profiles
            .get(&device.profile_name)
            .ok_or_else(|| Error::not_found("device profile", &device.profile_name))?;

        if let Some(command) = profile.command(source_name) {
            let requests = command
                .resources
                .iter()
                .map(|name| {
                    profile.resource(name).map(CommandRequest::from).ok_or_else(|| {
                        Error::config(format!(
                            "command {} of profile {} lists unknown resource {}",
                            command.name, profile.name, name
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok((profile, requests));
        }

        match profile.resource(source_name) {
            Some(resource) => Ok((profile, vec![CommandRequest::from(resource)])),
            None => Err(Error::not_found("device resource", source_name)),
        }
    }
}

#[async_trait]
impl ReadGateway for DriverReadGateway {
    async fn read(&self, device_name: &str, resource_name: &str, correlation_id: &str) -> Result<Event> {
        let (profile, requests) = self.resolve(device_name, resource_name)?;

        let values = self
            .driver
            .handle_read_commands(device_name, &requests)
            .await
            .map_err(|e| Error::read(device_name, resource_name, e.to_string()))?;

        if values.len() != requests.len() {
            return Err(Error::read(
                device_name,
                resource_name,
                format!(
                    "driver returned {} values for {} requests",
                    values.len(),
                    requests.len()
                ),
            ));
        }

        let mut event = Event::new(&profile.name, device_name, resource_name);
        for value in values {
            match value.value {
                ReadingValue::Simple { value: raw } => {
                    event.add_simple_reading(&value.resource_name, value.value_type, raw)?
                }
                ReadingValue::Binary {
                    binary_value,
                    media_type,
                } => event.add_binary_reading(&value.resource_name, binary_value, media_type),
            }
        }

        debug!(
            device = %device_name,
            source = %resource_name,
            correlation_id = %correlation_id,
            readings = event.readings.len(),
            "Read device resource"
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{CommandValue, SimpleDriver};
    use device_contracts::ValueType;

    const CONFIG: &str = r#"{
        "profiles": [{
            "name": "thermo",
            "resources": [
                { "name": "Temperature", "valueType": "Float32" },
                { "name": "Humidity", "valueType": "Uint8" },
                { "name": "Snapshot", "valueType": "Binary", "mediaType": "image/jpeg" }
            ],
            "commands": [
                { "name": "Climate", "resources": ["Temperature", "Humidity"] },
                { "name": "Broken", "resources": ["Temperature", "Pressure"] }
            ]
        }],
        "devices": [{ "name": "thermo-1", "profileName": "thermo" }]
    }"#;

    fn gateway(driver: Arc<dyn ProtocolDriver>) -> DriverReadGateway {
        DriverReadGateway::new(driver, &SdkConfig::from_json(CONFIG).unwrap())
    }

    /// Driver returning fixed values or failing outright.
    struct FixedDriver {
        values: Option<Vec<CommandValue>>,
    }

    #[async_trait]
    impl ProtocolDriver for FixedDriver {
        async fn handle_read_commands(
            &self,
            device_name: &str,
            _requests: &[CommandRequest],
        ) -> Result<Vec<CommandValue>> {
            self.values
                .clone()
                .ok_or_else(|| Error::Other(format!("{device_name} unreachable")))
        }
    }

    #[tokio::test]
    async fn test_command_expands_to_resources() {
        let gateway = gateway(Arc::new(SimpleDriver::new()));
        let event = gateway.read("thermo-1", "Climate", "cid").await.unwrap();

        assert_eq!(event.source_name, "Climate");
        assert_eq!(event.profile_name, "thermo");
        let names: Vec<_> = event.readings.iter().map(|r| r.resource_name.as_str()).collect();
        assert_eq!(names, ["Temperature", "Humidity"]);
        assert_eq!(event.readings[1].value_type, ValueType::Uint8);
    }

    #[tokio::test]
    async fn test_single_binary_resource() {
        let gateway = gateway(Arc::new(SimpleDriver::new()));
        let event = gateway.read("thermo-1", "Snapshot", "cid").await.unwrap();

        assert_eq!(event.readings.len(), 1);
        assert!(event.has_binary_value());
        match &event.readings[0].value {
            ReadingValue::Binary { media_type, .. } => assert_eq!(media_type, "image/jpeg"),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_names() {
        let gateway = gateway(Arc::new(SimpleDriver::new()));
        assert!(matches!(
            gateway.read("ghost", "Temperature", "cid").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            gateway.read("thermo-1", "Pressure", "cid").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            gateway.read("thermo-1", "Broken", "cid").await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_driver_failure_fails_whole_read() {
        let gateway = gateway(Arc::new(FixedDriver { values: None }));
        assert!(matches!(
            gateway.read("thermo-1", "Climate", "cid").await,
            Err(Error::Read { .. })
        ));
    }

    #[tokio::test]
    async fn test_short_driver_result_is_rejected() {
        let gateway = gateway(Arc::new(FixedDriver {
            values: Some(vec![CommandValue::simple("Temperature", ValueType::Float32, 21.5)]),
        }));
        assert!(matches!(
            gateway.read("thermo-1", "Climate", "cid").await,
            Err(Error::Read { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_driver_value_is_rejected() {
        let gateway = gateway(Arc::new(FixedDriver {
            values: Some(vec![CommandValue::simple("Humidity", ValueType::Uint8, "-1")]),
        }));
        assert!(matches!(
            gateway.read("thermo-1", "Humidity", "cid").await,
            Err(Error::Contract(_))
        ));
    }
}
