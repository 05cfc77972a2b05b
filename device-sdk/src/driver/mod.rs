//! Protocol driver seam.
//!
//! A [`ProtocolDriver`] talks to real hardware. The SDK hands it the typed
//! resource requests resolved from a device profile and gets typed values
//! back. [`DriverReadGateway`] adapts any driver to the auto-event
//! [`ReadGateway`](crate::autoevent::ReadGateway).

mod reader;
mod simple;

use async_trait::async_trait;
use device_contracts::{CONTENT_TYPE_OCTET_STREAM, ReadingValue, ValueType};

use crate::Result;
use crate::config::ResourceConfig;

pub use reader::DriverReadGateway;
pub use simple::SimpleDriver;

/// One resource to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub resource_name: String,
    pub value_type: ValueType,
    /// Media type for binary resources.
    pub media_type: Option<String>,
}

impl CommandRequest {
    pub fn new(resource_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            resource_name: resource_name.into(),
            value_type,
            media_type: None,
        }
    }

    /// Media type a binary value for this request should carry.
    pub fn binary_media_type(&self) -> &str {
        self.media_type.as_deref().unwrap_or(CONTENT_TYPE_OCTET_STREAM)
    }
}

impl From<&ResourceConfig> for CommandRequest {
    fn from(resource: &ResourceConfig) -> Self {
        Self {
            resource_name: resource.name.clone(),
            value_type: resource.value_type,
            media_type: resource.media_type.clone(),
        }
    }
}

/// One value produced by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandValue {
    pub resource_name: String,
    pub value_type: ValueType,
    pub value: ReadingValue,
}

impl CommandValue {
    pub fn simple(
        resource_name: impl Into<String>,
        value_type: ValueType,
        value: impl ToString,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            value_type,
            value: ReadingValue::simple(value.to_string()),
        }
    }

    pub fn binary(
        resource_name: impl Into<String>,
        bytes: Vec<u8>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            value_type: ValueType::Binary,
            value: ReadingValue::binary(bytes, media_type),
        }
    }
}

/// Device protocol implementation.
#[async_trait]
pub trait ProtocolDriver: Send + Sync + 'static {
    /// Read every request in one round trip.
    ///
    /// Implementations return exactly one value per request, in request order.
    async fn handle_read_commands(
        &self,
        device_name: &str,
        requests: &[CommandRequest],
    ) -> Result<Vec<CommandValue>>;
}
