//! Best-effort delivery of settled results to a downstream consumer.
//!
//! A failed delivery is reported to the caller, which logs it. Nothing is
//! retried; the consumer can always poll the topic or drain the queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clusters_types::{Categories, ForwardSettings, Summaries, Topic};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::SchedulerError;

/// Receives a topic snapshot after a settled categorization.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, topic: &Topic) -> Result<(), SchedulerError>;
}

/// JSON body POSTed downstream.
#[derive(Debug, Serialize)]
pub struct ForwardPayload<'a> {
    pub session_id: &'a str,
    pub topic_id: &'a str,
    pub result: Option<&'a Categories>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summaries: Option<&'a Summaries>,
    pub timestamp: DateTime<Utc>,
}

impl<'a> ForwardPayload<'a> {
    pub fn from_topic(topic: &'a Topic) -> Self {
        Self {
            session_id: &topic.session_id,
            topic_id: &topic.topic_id,
            result: topic.result.as_ref(),
            summaries: topic.summaries.as_ref(),
            timestamp: Utc::now(),
        }
    }
}

/// POSTs settled results to a fixed URL.
pub struct HttpForwarder {
    client: Client,
    url: String,
}

impl HttpForwarder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SchedulerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::Delivery(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, topic: &Topic) -> Result<(), SchedulerError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ForwardPayload::from_topic(topic))
            .send()
            .await
            .map_err(|e| SchedulerError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SchedulerError::Delivery(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        debug!(
            session_id = %topic.session_id,
            topic_id = %topic.topic_id,
            "Forwarded result"
        );
        Ok(())
    }
}

/// Used when no downstream URL is configured.
pub struct NoopForwarder;

#[async_trait]
impl Forwarder for NoopForwarder {
    async fn forward(&self, _topic: &Topic) -> Result<(), SchedulerError> {
        Ok(())
    }
}

/// Build the forwarder described by settings.
pub fn forwarder_from_settings(
    settings: &ForwardSettings,
) -> Result<Arc<dyn Forwarder>, SchedulerError> {
    match settings.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => {
            info!(url = %url, "Forwarding settled results downstream");
            Ok(Arc::new(HttpForwarder::new(
                url,
                Duration::from_millis(settings.timeout_ms),
            )?))
        }
        None => Ok(Arc::new(NoopForwarder)),
    }
}
