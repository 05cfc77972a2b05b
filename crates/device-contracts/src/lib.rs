//! # Device Contracts
//!
//! Wire-level data transfer objects exchanged between a device service and the
//! core data ingestion service.
//!
//! ## Features
//!
//! - `Event` / `BaseReading` with scalar and binary reading payloads
//! - `AddEventRequest` envelope and `BaseResponse` error body
//! - Shared header names, content types and the API version tag
//!

mod common;
mod error;
mod event;
mod reading;

pub use common::{BaseRequest, BaseResponse, Versionable};
pub use error::ContractError;
pub use event::{AddEventRequest, Event};
pub use reading::{BaseReading, ReadingValue, ValueType};

/// API version carried by every versioned DTO.
pub const API_VERSION: &str = "v2";

/// Header used to thread a correlation id through service boundaries.
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/// Content type header name.
pub const CONTENT_TYPE: &str = "Content-Type";

/// JSON media type.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Default media type for opaque binary readings.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Current wall clock as nanoseconds since the Unix epoch.
pub fn origin_now() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}
