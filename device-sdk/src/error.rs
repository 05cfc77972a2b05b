//! SDK-wide error types.

use device_contracts::ContractError;
use thiserror::Error;

/// SDK-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// SDK-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Read error: device {device}, resource {resource}: {message}")]
    Read {
        device: String,
        resource: String,
        message: String,
    },

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn read(
        device: impl Into<String>,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Read {
            device: device.into(),
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}
