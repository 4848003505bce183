// src/services/notifier.rs

//! Alert delivery.
//!
//! Subscribers receive change and eviction alerts; the operator receives
//! alerts when the watcher stops or cannot reach subscribers.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::Subscription;

/// Sends alerts for subscriptions and to the operator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The watched content changed.
    async fn notify_change(&self, subscription: &Subscription, summary: &str) -> Result<()>;

    /// The subscription was dropped after repeated failures.
    async fn notify_eviction(&self, subscription: &Subscription) -> Result<()>;

    /// Operator alert. Callers treat failures here as terminal.
    async fn notify_operator(&self, message: &str) -> Result<()>;
}

/// Subscriber-facing text for a change alert.
pub fn change_message(subscription: &Subscription) -> String {
    format!(
        "pagewatch: The website you asked me to watch changed. See: {}",
        subscription.url
    )
}

/// Subscriber-facing text for an eviction alert.
pub fn eviction_message(subscription: &Subscription) -> String {
    format!(
        "pagewatch: Stopped watching {} after {} consecutive failures.",
        subscription.url, subscription.consecutive_errors
    )
}

/// Operator-facing text for a stop condition.
pub fn operator_message(error: &AppError) -> String {
    format!("pagewatch stopped: {error}")
}

/// Writes alerts to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_change(&self, subscription: &Subscription, summary: &str) -> Result<()> {
        log::info!(
            "[ALERT → {}] {} ({})",
            subscription.destination(),
            change_message(subscription),
            summary
        );
        Ok(())
    }

    async fn notify_eviction(&self, subscription: &Subscription) -> Result<()> {
        log::warn!(
            "[ALERT → {}] {}",
            subscription.destination(),
            eviction_message(subscription)
        );
        Ok(())
    }

    async fn notify_operator(&self, message: &str) -> Result<()> {
        log::error!("[OPERATOR] {}", message);
        Ok(())
    }
}

/// JSON body posted to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_number: Option<&'a str>,
}

/// Posts alerts to an HTTP webhook, which fans them out to email/SMS.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    operator_url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> Self {
        let webhook_url = webhook_url.into();
        Self {
            client,
            operator_url: webhook_url.clone(),
            webhook_url,
        }
    }

    /// Route operator alerts to a separate webhook.
    pub fn with_operator_url(mut self, url: impl Into<String>) -> Self {
        self.operator_url = url.into();
        self
    }

    async fn post(&self, url: &str, payload: &WebhookPayload<'_>) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(AppError::notify)?;

        if !response.status().is_success() {
            return Err(AppError::notify(format!(
                "webhook {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }

    fn subscriber_payload(subscription: &Subscription, content: String) -> WebhookPayload<'_> {
        WebhookPayload {
            content,
            email: subscription.email.as_deref(),
            mobile_number: subscription.mobile_number.as_deref(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_change(&self, subscription: &Subscription, summary: &str) -> Result<()> {
        let content = format!("{}\n{}", change_message(subscription), summary);
        let payload = Self::subscriber_payload(subscription, content);
        self.post(&self.webhook_url, &payload).await
    }

    async fn notify_eviction(&self, subscription: &Subscription) -> Result<()> {
        let payload = Self::subscriber_payload(subscription, eviction_message(subscription));
        self.post(&self.webhook_url, &payload).await
    }

    async fn notify_operator(&self, message: &str) -> Result<()> {
        let payload = WebhookPayload {
            content: message.to_string(),
            email: None,
            mobile_number: None,
        };
        self.post(&self.operator_url, &payload).await
    }
}
