//! On-change filtering of reading batches.
//!
//! Each executor with on-change enabled owns one [`ChangeFilter`]. The filter
//! remembers the last value seen per resource: scalars verbatim, binary
//! payloads as a SHA-256 digest so large blobs are never retained.

use std::collections::HashMap;

use device_contracts::{BaseReading, ReadingValue};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Last observed value of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LastValueRecord {
    #[default]
    Unset,
    Scalar(String),
    Digest([u8; 32]),
}

impl LastValueRecord {
    /// Record for a freshly observed value. Binary payloads become digests.
    pub fn of(value: &ReadingValue) -> Self {
        match value {
            ReadingValue::Simple { value } => LastValueRecord::Scalar(value.clone()),
            ReadingValue::Binary { binary_value, .. } => {
                LastValueRecord::Digest(payload_digest(binary_value))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            LastValueRecord::Unset => "unset",
            LastValueRecord::Scalar(_) => "scalar",
            LastValueRecord::Digest(_) => "digest",
        }
    }
}

/// SHA-256 of a binary payload.
pub fn payload_digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Per-executor last-value store deciding whether a batch is a repeat.
#[derive(Debug, Default)]
pub struct ChangeFilter {
    last_values: RwLock<HashMap<String, LastValueRecord>>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when every reading equals the stored value for its
    /// resource. Changed readings update the store, so the first observation
    /// of a resource is never suppressed.
    pub fn should_suppress(&self, readings: &[BaseReading]) -> bool {
        let mut last_values = self.last_values.write();
        let mut identical = true;

        for reading in readings {
            let record = last_values
                .entry(reading.resource_name.clone())
                .or_default();
            if Self::record_change(record, &reading.resource_name, &reading.value) {
                identical = false;
            }
        }

        identical
    }

    /// Single-resource form of [`ChangeFilter::should_suppress`].
    pub fn should_suppress_value(&self, resource_name: &str, value: &ReadingValue) -> bool {
        let mut last_values = self.last_values.write();
        let record = last_values.entry(resource_name.to_string()).or_default();
        !Self::record_change(record, resource_name, value)
    }

    /// Compare `value` to `record`, replacing the record when it changed.
    fn record_change(record: &mut LastValueRecord, resource_name: &str, value: &ReadingValue) -> bool {
        let changed = match (&*record, value) {
            (LastValueRecord::Unset, _) => true,
            (LastValueRecord::Digest(previous), ReadingValue::Binary { binary_value, .. }) => {
                *previous != payload_digest(binary_value)
            }
            (LastValueRecord::Scalar(previous), ReadingValue::Simple { value }) => previous != value,
            (stored, _) => {
                // Fail open: a reading is never dropped on a shape mismatch.
                warn!(
                    resource = %resource_name,
                    stored = stored.kind(),
                    binary = value.is_binary(),
                    "Stored last value does not match reading kind, treating as changed"
                );
                true
            }
        };

        if changed {
            *record = LastValueRecord::of(value);
        }
        changed
    }

    pub fn last_value(&self, resource_name: &str) -> Option<LastValueRecord> {
        self.last_values.read().get(resource_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.last_values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_values.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_contracts::ValueType;

    fn scalar(resource: &str, value: &str) -> BaseReading {
        BaseReading::new_simple("p", "d", resource, ValueType::Int32, value).unwrap()
    }

    fn binary(resource: &str, bytes: &[u8]) -> BaseReading {
        BaseReading::new_binary("p", "d", resource, bytes.to_vec(), "image/png")
    }

    #[test]
    fn test_first_observation_is_never_suppressed() {
        let filter = ChangeFilter::new();
        assert!(!filter.should_suppress(&[scalar("Temperature", "20")]));
        assert_eq!(
            filter.last_value("Temperature"),
            Some(LastValueRecord::Scalar("20".to_string()))
        );
    }

    #[test]
    fn test_constant_scalar_is_suppressed_after_first() {
        let filter = ChangeFilter::new();
        assert!(!filter.should_suppress(&[scalar("Temperature", "20")]));
        for _ in 0..5 {
            assert!(filter.should_suppress(&[scalar("Temperature", "20")]));
        }
        assert!(!filter.should_suppress(&[scalar("Temperature", "21")]));
        assert!(filter.should_suppress(&[scalar("Temperature", "21")]));
    }

    #[test]
    fn test_binary_stored_as_digest() {
        let filter = ChangeFilter::new();
        filter.should_suppress(&[binary("Snapshot", b"frame-1")]);

        assert_eq!(
            filter.last_value("Snapshot"),
            Some(LastValueRecord::Digest(payload_digest(b"frame-1")))
        );
    }

    #[test]
    fn test_binary_content_change_is_detected() {
        let filter = ChangeFilter::new();
        assert!(!filter.should_suppress(&[binary("Snapshot", b"frame-1")]));
        assert!(filter.should_suppress(&[binary("Snapshot", b"frame-1")]));

        // Same length, same media type, one byte differs.
        assert!(!filter.should_suppress(&[binary("Snapshot", b"frame-2")]));

        let mut other_media = binary("Snapshot", b"frame-2");
        other_media.value = ReadingValue::binary(b"frame-2".to_vec(), "image/jpeg");
        assert!(filter.should_suppress(&[other_media]));
    }

    #[test]
    fn test_batch_changed_if_any_reading_changed() {
        let filter = ChangeFilter::new();
        let batch = [scalar("A", "1"), scalar("B", "2")];
        assert!(!filter.should_suppress(&batch));
        assert!(filter.should_suppress(&batch));

        assert!(!filter.should_suppress(&[scalar("A", "1"), scalar("B", "3")]));
        assert_eq!(filter.last_value("A"), Some(LastValueRecord::Scalar("1".to_string())));
        assert_eq!(filter.last_value("B"), Some(LastValueRecord::Scalar("3".to_string())));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_kind_mismatch_fails_open_and_restores_kind() {
        let filter = ChangeFilter::new();
        assert!(!filter.should_suppress_value("R", &ReadingValue::simple("1")));

        let bytes = ReadingValue::binary(b"1".to_vec(), "application/octet-stream");
        assert!(!filter.should_suppress_value("R", &bytes));
        assert_eq!(
            filter.last_value("R"),
            Some(LastValueRecord::Digest(payload_digest(b"1")))
        );
        assert!(filter.should_suppress_value("R", &bytes));
    }

    #[test]
    fn test_resources_are_tracked_independently() {
        let filter = ChangeFilter::new();
        assert!(filter.is_empty());
        assert!(!filter.should_suppress_value("A", &ReadingValue::simple("x")));
        assert!(!filter.should_suppress_value("B", &ReadingValue::simple("x")));
        assert!(filter.should_suppress_value("A", &ReadingValue::simple("x")));
    }
}
