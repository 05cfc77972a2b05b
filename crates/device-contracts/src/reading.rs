use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContractError, origin_now};

/// Type tag carried by every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    String,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Binary,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Bool => "Bool",
            ValueType::String => "String",
            ValueType::Uint8 => "Uint8",
            ValueType::Uint16 => "Uint16",
            ValueType::Uint32 => "Uint32",
            ValueType::Uint64 => "Uint64",
            ValueType::Int8 => "Int8",
            ValueType::Int16 => "Int16",
            ValueType::Int32 => "Int32",
            ValueType::Int64 => "Int64",
            ValueType::Float32 => "Float32",
            ValueType::Float64 => "Float64",
            ValueType::Binary => "Binary",
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ValueType::Binary)
    }

    /// Check that `value` is a well-formed string rendition of this type.
    ///
    /// Binary never validates: binary payloads are not carried as strings.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ValueType::Bool => value.parse::<bool>().is_ok(),
            ValueType::String => true,
            ValueType::Uint8 => value.parse::<u8>().is_ok(),
            ValueType::Uint16 => value.parse::<u16>().is_ok(),
            ValueType::Uint32 => value.parse::<u32>().is_ok(),
            ValueType::Uint64 => value.parse::<u64>().is_ok(),
            ValueType::Int8 => value.parse::<i8>().is_ok(),
            ValueType::Int16 => value.parse::<i16>().is_ok(),
            ValueType::Int32 => value.parse::<i32>().is_ok(),
            ValueType::Int64 => value.parse::<i64>().is_ok(),
            ValueType::Float32 => value.parse::<f32>().is_ok(),
            ValueType::Float64 => value.parse::<f64>().is_ok(),
            ValueType::Binary => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a reading: a scalar rendered as a string, or opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Simple {
        value: String,
    },
    Binary {
        #[serde(rename = "binaryValue", with = "base64_bytes")]
        binary_value: Vec<u8>,
        #[serde(rename = "mediaType")]
        media_type: String,
    },
}

impl ReadingValue {
    pub fn simple(value: impl Into<String>) -> Self {
        ReadingValue::Simple {
            value: value.into(),
        }
    }

    pub fn binary(bytes: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        ReadingValue::Binary {
            binary_value: bytes.into(),
            media_type: media_type.into(),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ReadingValue::Binary { .. })
    }
}

/// A single named, typed value produced by a device read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseReading {
    pub id: String,
    pub origin: i64,
    pub device_name: String,
    pub resource_name: String,
    pub profile_name: String,
    pub value_type: ValueType,
    #[serde(flatten)]
    pub value: ReadingValue,
}

impl BaseReading {
    /// Build a scalar reading, validating `value` against `value_type`.
    pub fn new_simple(
        profile_name: &str,
        device_name: &str,
        resource_name: &str,
        value_type: ValueType,
        value: impl Into<String>,
    ) -> Result<Self, ContractError> {
        let value = value.into();
        if value_type.is_binary() {
            return Err(ContractError::BinaryValueType {
                resource: resource_name.to_string(),
            });
        }
        if !value_type.accepts(&value) {
            return Err(ContractError::InvalidValue {
                resource: resource_name.to_string(),
                value_type,
                value,
            });
        }

        Ok(Self::with_value(
            profile_name,
            device_name,
            resource_name,
            value_type,
            ReadingValue::Simple { value },
        ))
    }

    pub fn new_binary(
        profile_name: &str,
        device_name: &str,
        resource_name: &str,
        binary_value: Vec<u8>,
        media_type: impl Into<String>,
    ) -> Self {
        Self::with_value(
            profile_name,
            device_name,
            resource_name,
            ValueType::Binary,
            ReadingValue::binary(binary_value, media_type),
        )
    }

    fn with_value(
        profile_name: &str,
        device_name: &str,
        resource_name: &str,
        value_type: ValueType,
        value: ReadingValue,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            origin: origin_now(),
            device_name: device_name.to_string(),
            resource_name: resource_name.to_string(),
            profile_name: profile_name.to_string(),
            value_type,
            value,
        }
    }

    pub fn is_binary(&self) -> bool {
        self.value.is_binary()
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
