use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{BaseReading, BaseRequest, ContractError, ValueType, Versionable, origin_now};

/// A batch of readings produced by one read of a device resource or command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    pub versionable: Versionable,
    pub id: String,
    pub device_name: String,
    pub profile_name: String,
    pub source_name: String,
    pub origin: i64,
    #[serde(default)]
    pub readings: Vec<BaseReading>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
}

impl Event {
    /// Create an event with no readings.
    pub fn new(
        profile_name: impl Into<String>,
        device_name: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            versionable: Versionable::default(),
            id: uuid::Uuid::new_v4().to_string(),
            device_name: device_name.into(),
            profile_name: profile_name.into(),
            source_name: source_name.into(),
            origin: origin_now(),
            readings: Vec::new(),
            tags: HashMap::new(),
        }
    }

    pub fn add_simple_reading(
        &mut self,
        resource_name: &str,
        value_type: ValueType,
        value: impl Into<String>,
    ) -> Result<(), ContractError> {
        let reading = BaseReading::new_simple(
            &self.profile_name,
            &self.device_name,
            resource_name,
            value_type,
            value,
        )?;
        self.readings.push(reading);
        Ok(())
    }

    pub fn add_binary_reading(
        &mut self,
        resource_name: &str,
        binary_value: Vec<u8>,
        media_type: impl Into<String>,
    ) {
        self.readings.push(BaseReading::new_binary(
            &self.profile_name,
            &self.device_name,
            resource_name,
            binary_value,
            media_type,
        ));
    }

    pub fn has_binary_value(&self) -> bool {
        self.readings.iter().any(BaseReading::is_binary)
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Envelope posted to the ingestion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddEventRequest {
    #[serde(flatten)]
    pub base: BaseRequest,
    pub event: Event,
}

impl AddEventRequest {
    pub fn new(event: Event) -> Self {
        Self {
            base: BaseRequest::new(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_is_empty() {
        let event = Event::new("profile", "device", "Temperature");
        assert!(event.is_empty());
        assert!(!event.has_binary_value());
        assert!(event.origin > 0);
        assert_eq!(event.versionable.api_version, "v2");
    }

    #[test]
    fn test_readings_inherit_event_names() {
        let mut event = Event::new("thermo-profile", "thermo-1", "Status");
        event
            .add_simple_reading("Temperature", ValueType::Float32, "21.5")
            .unwrap();
        event.add_binary_reading("Snapshot", vec![1, 2, 3], "image/png");

        assert_eq!(event.readings.len(), 2);
        assert!(event.has_binary_value());
        for reading in &event.readings {
            assert_eq!(reading.device_name, "thermo-1");
            assert_eq!(reading.profile_name, "thermo-profile");
        }
    }

    #[test]
    fn test_invalid_simple_reading_is_not_added() {
        let mut event = Event::new("p", "d", "s");
        assert!(
            event
                .add_simple_reading("Switch", ValueType::Bool, "maybe")
                .is_err()
        );
        assert!(event.is_empty());
    }

    #[test]
    fn test_add_event_request_json_shape() {
        let mut event = Event::new("p", "d", "s");
        event.add_simple_reading("r", ValueType::Uint8, "7").unwrap();
        event.tags.insert("site".to_string(), "north".to_string());

        let json = serde_json::to_value(AddEventRequest::new(event)).unwrap();
        assert_eq!(json["apiVersion"], "v2");
        assert!(json["requestId"].is_string());
        assert_eq!(json["event"]["sourceName"], "s");
        assert_eq!(json["event"]["tags"]["site"], "north");
        assert_eq!(json["event"]["readings"][0]["value"], "7");

        let parsed: AddEventRequest = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.event.readings.len(), 1);
    }
}
