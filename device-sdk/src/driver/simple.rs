//! Random-value reference driver.
//!
//! Every device gets its own set of integer ranges, adjustable at runtime
//! through the `Min_*`/`Max_*` pseudo resources.

use std::collections::HashMap;

use async_trait::async_trait;
use device_contracts::ValueType;
use parking_lot::Mutex;
use rand::RngExt;
use tracing::{debug, info};

use super::{CommandRequest, CommandValue, ProtocolDriver};
use crate::{Error, Result};

const BINARY_VALUE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueRange {
    min: i64,
    max: i64,
}

impl ValueRange {
    const fn of(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

/// Generation bounds of one simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RandomDevice {
    int8: ValueRange,
    int16: ValueRange,
    int32: ValueRange,
}

impl Default for RandomDevice {
    fn default() -> Self {
        Self {
            int8: ValueRange::of(i8::MIN as i64, i8::MAX as i64),
            int16: ValueRange::of(i16::MIN as i64, i16::MAX as i64),
            int32: ValueRange::of(i32::MIN as i64, i32::MAX as i64),
        }
    }
}

impl RandomDevice {
    fn value(&self, request: &CommandRequest) -> CommandValue {
        let mut rng = rand::rng();
        let name = request.resource_name.as_str();
        let value_type = request.value_type;

        match value_type {
            ValueType::Int8 => {
                CommandValue::simple(name, value_type, rng.random_range(self.int8.min..=self.int8.max))
            }
            ValueType::Int16 => CommandValue::simple(
                name,
                value_type,
                rng.random_range(self.int16.min..=self.int16.max),
            ),
            ValueType::Int32 => CommandValue::simple(
                name,
                value_type,
                rng.random_range(self.int32.min..=self.int32.max),
            ),
            ValueType::Int64 => CommandValue::simple(name, value_type, rng.random::<i64>()),
            ValueType::Uint8 => CommandValue::simple(name, value_type, rng.random::<u8>()),
            ValueType::Uint16 => CommandValue::simple(name, value_type, rng.random::<u16>()),
            ValueType::Uint32 => CommandValue::simple(name, value_type, rng.random::<u32>()),
            ValueType::Uint64 => CommandValue::simple(name, value_type, rng.random::<u64>()),
            ValueType::Float32 => {
                CommandValue::simple(name, value_type, rng.random_range(0.0f32..100.0))
            }
            ValueType::Float64 => {
                CommandValue::simple(name, value_type, rng.random_range(0.0f64..100.0))
            }
            ValueType::Bool => CommandValue::simple(name, value_type, rng.random::<bool>()),
            ValueType::String => {
                CommandValue::simple(name, value_type, format!("{:08x}", rng.random::<u32>()))
            }
            ValueType::Binary => {
                let bytes: Vec<u8> = (0..BINARY_VALUE_LEN).map(|_| rng.random::<u8>()).collect();
                CommandValue::binary(name, bytes, request.binary_media_type())
            }
        }
    }
}

/// Driver producing random values for every requested resource.
#[derive(Debug, Default)]
pub struct SimpleDriver {
    devices: Mutex<HashMap<String, RandomDevice>>,
}

impl SimpleDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update one generation bound of `device_name`.
    ///
    /// `resource_name` is one of `Min_Int8`, `Max_Int8`, `Min_Int16`,
    /// `Max_Int16`, `Min_Int32` or `Max_Int32`. The value must fit the integer
    /// type and keep the range non-empty.
    pub fn handle_write_range(&self, device_name: &str, resource_name: &str, value: i64) -> Result<()> {
        let mut devices = self.devices.lock();
        let device = devices.entry(device_name.to_string()).or_default();

        let (range, type_bounds, is_min) = match resource_name {
            "Min_Int8" => (&mut device.int8, RandomDevice::default().int8, true),
            "Max_Int8" => (&mut device.int8, RandomDevice::default().int8, false),
            "Min_Int16" => (&mut device.int16, RandomDevice::default().int16, true),
            "Max_Int16" => (&mut device.int16, RandomDevice::default().int16, false),
            "Min_Int32" => (&mut device.int32, RandomDevice::default().int32, true),
            "Max_Int32" => (&mut device.int32, RandomDevice::default().int32, false),
            other => return Err(Error::not_found("device resource", other)),
        };

        if value < type_bounds.min || value > type_bounds.max {
            return Err(Error::config(format!(
                "{} must be between {} and {}, got {}",
                resource_name, type_bounds.min, type_bounds.max, value
            )));
        }

        let (min, max) = if is_min {
            (value, range.max)
        } else {
            (range.min, value)
        };
        if min > max {
            return Err(Error::config(format!(
                "{} {} would leave an empty range [{}, {}]",
                resource_name, value, min, max
            )));
        }

        *range = ValueRange::of(min, max);
        info!(device = %device_name, resource = %resource_name, value, "Random range updated");
        Ok(())
    }

    fn device(&self, device_name: &str) -> RandomDevice {
        *self.devices.lock().entry(device_name.to_string()).or_default()
    }
}

#[async_trait]
impl ProtocolDriver for SimpleDriver {
    async fn handle_read_commands(
        &self,
        device_name: &str,
        requests: &[CommandRequest],
    ) -> Result<Vec<CommandValue>> {
        let device = self.device(device_name);
        debug!(device = %device_name, count = requests.len(), "Generating random values");
        Ok(requests.iter().map(|request| device.value(request)).collect())
    }
}
