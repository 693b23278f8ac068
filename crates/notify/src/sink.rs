//! Delivery sinks. The trait is the seam between rendering and transport:
//! the server wires a [`WebhookSink`] when the notifier is enabled, a
//! [`NoopSink`] when it is not, and tests record through [`InMemorySink`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::debug;

use reqflow_core::config::NotifierConfig;

use crate::{Notification, NotifyError};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Swallows every notification. Used when the notifier is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(
            event_name = "notify.dropped",
            kind = notification.kind.as_str(),
            recipient = %notification.recipient_id,
            "notifier disabled, notification dropped"
        );
        Ok(())
    }
}

/// Records deliveries in order for assertions.
#[derive(Clone, Default)]
pub struct InMemorySink {
    deliveries: Arc<RwLock<Vec<Notification>>>,
}

impl InMemorySink {
    pub async fn deliveries(&self) -> Vec<Notification> {
        self.deliveries.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemorySink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.deliveries.write().await.push(notification.clone());
        Ok(())
    }
}

/// Posts each notification as JSON to a configured webhook.
#[derive(Debug)]
pub struct WebhookSink {
    client: reqwest::Client,
    webhook_url: String,
    auth_token: Option<SecretString>,
}

impl WebhookSink {
    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let webhook_url = config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                NotifyError::Configuration("notifier.webhook_url is not set".to_owned())
            })?
            .to_owned();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| NotifyError::Configuration(error.to_string()))?;

        Ok(Self { client, webhook_url, auth_token: config.auth_token.clone() })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.webhook_url).json(notification);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| NotifyError::Delivery(error.to_string()))?;
        response
            .error_for_status()
            .map_err(|error| NotifyError::Delivery(error.to_string()))?;

        debug!(
            event_name = "notify.delivered",
            kind = notification.kind.as_str(),
            recipient = %notification.recipient_id,
            "notification delivered"
        );
        Ok(())
    }
}
