use thiserror::Error;

use crate::ValueType;

/// Errors raised while building contract objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("resource {resource}: binary values must be added with add_binary_reading")]
    BinaryValueType { resource: String },

    #[error("resource {resource}: value {value:?} is not a valid {value_type}")]
    InvalidValue {
        resource: String,
        value_type: ValueType,
        value: String,
    },
}
