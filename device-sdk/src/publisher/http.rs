use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use device_contracts::{API_VERSION, AddEventRequest, BaseResponse, CORRELATION_HEADER, Event};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::autoevent::PublishGateway;
use crate::{Error, Result};

/// Install the process-wide rustls crypto provider once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Publishes events to the core data ingestion service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEventPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventPublisher {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        install_rustls_provider();

        let mut builder = reqwest::Client::builder();
        if request_timeout > Duration::ZERO {
            builder = builder.timeout(request_timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Endpoint accepting `event`.
    pub fn event_url(&self, event: &Event) -> String {
        format!(
            "{}/api/{}/event/{}/{}/{}",
            self.base_url, API_VERSION, event.profile_name, event.device_name, event.source_name
        )
    }
}

#[async_trait]
impl PublishGateway for HttpEventPublisher {
    async fn publish(&self, event: &Event, correlation_id: &str) -> Result<()> {
        let url = self.event_url(event);
        let request = AddEventRequest::new(event.clone());

        let response = self
            .client
            .post(&url)
            .header(CORRELATION_HEADER, correlation_id)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() <= StatusCode::MULTI_STATUS.as_u16() {
            debug!(url = %url, status = %status, correlation_id = %correlation_id, "Event published");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<BaseResponse>(&body) {
            Ok(base) => base.message_text(),
            Err(_) => body,
        };
        warn!(
            url = %url,
            status = %status,
            correlation_id = %correlation_id,
            "Ingestion service rejected event"
        );
        Err(Error::Publish(format!("{}: {}", status, message)))
    }
}
