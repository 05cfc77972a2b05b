//! Publish gateways.
//!
//! - [`HttpEventPublisher`]: POSTs events to the core data ingestion service
//! - [`LoggingPublisher`]: logs events, used when no ingestion URL is configured

mod http;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use device_contracts::Event;
use tracing::info;

use crate::Result;
use crate::autoevent::PublishGateway;
use crate::config::ServiceConfig;

pub use http::{HttpEventPublisher, install_rustls_provider};

/// Publisher that only logs what it would have sent.
#[derive(Debug, Default)]
pub struct LoggingPublisher {
    published: AtomicU64,
}

impl LoggingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PublishGateway for LoggingPublisher {
    async fn publish(&self, event: &Event, correlation_id: &str) -> Result<()> {
        self.published.fetch_add(1, Ordering::Relaxed);
        info!(
            device = %event.device_name,
            source = %event.source_name,
            readings = event.readings.len(),
            binary = event.has_binary_value(),
            correlation_id = %correlation_id,
            "Event"
        );
        Ok(())
    }
}

/// Pick the publisher matching the service configuration.
pub fn from_config(service: &ServiceConfig) -> Result<Arc<dyn PublishGateway>> {
    match service.ingestion_url.as_deref() {
        Some(url) => {
            info!(url = %url, "Publishing events over HTTP");
            Ok(Arc::new(HttpEventPublisher::new(url, service.request_timeout)?))
        }
        None => {
            info!("No ingestion URL configured, events will only be logged");
            Ok(Arc::new(LoggingPublisher::new()))
        }
    }
}
