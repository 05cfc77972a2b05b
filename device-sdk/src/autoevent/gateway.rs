//! Collaborator seams used by the auto-event executors.
//!
//! Executors never talk to a driver, an HTTP client or the service state
//! directly. They go through these traits, which keeps the scheduling logic
//! testable with plain in-memory fakes.

use async_trait::async_trait;
use device_contracts::Event;

use crate::Result;

/// Reads one resource (or command) of a device into a batch of readings.
#[async_trait]
pub trait ReadGateway: Send + Sync + 'static {
    /// Perform one read.
    ///
    /// `correlation_id` is generated per tick and must be passed along to any
    /// downstream call made on behalf of this read.
    async fn read(&self, device_name: &str, resource_name: &str, correlation_id: &str)
    -> Result<Event>;
}

/// Pushes a batch of readings to the ingestion service.
#[async_trait]
pub trait PublishGateway: Send + Sync + 'static {
    async fn publish(&self, event: &Event, correlation_id: &str) -> Result<()>;
}

/// Administrative lock state of the owning device service.
pub trait LockState: Send + Sync + 'static {
    fn is_locked(&self) -> bool;
}
