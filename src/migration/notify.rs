//! # Outbound notifications.
//!
//! [`Notify`] is the seam the orchestrator reports successful migrations through.
//! [`WebhookNotifier`] posts `{"content": <message>}` to a chat webhook.
//!
//! Delivery is best-effort: failures become a `NotificationFailed` event and are
//! never returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::events::{Bus, Event, EventKind};

/// Per-request timeout for webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Sink for operator-facing messages.
#[async_trait]
pub trait Notify: Send + Sync + 'static {
    /// Delivers `message`; must not fail the caller.
    async fn notify(&self, message: &str);
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
}

/// Posts messages to a webhook URL. Without a URL every call is a no-op.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
    bus: Bus,
}

impl WebhookNotifier {
    /// `url = None` (or empty) disables delivery.
    pub fn new(url: Option<String>, bus: Bus) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "webhook client builder failed; using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
            bus,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn post(&self, url: &str, message: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(url)
            .json(&WebhookBody { content: message })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notify for WebhookNotifier {
    async fn notify(&self, message: &str) {
        let Some(url) = self.url.as_deref() else {
            tracing::debug!("no webhook configured; notification skipped");
            return;
        };
        if let Err(e) = self.post(url, message).await {
            self.bus
                .publish(Event::new(EventKind::NotificationFailed).with_reason(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_disables_delivery() {
        let bus = Bus::new(4);
        assert!(!WebhookNotifier::new(None, bus.clone()).is_enabled());
        assert!(!WebhookNotifier::new(Some("  ".into()), bus.clone()).is_enabled());
        assert!(WebhookNotifier::new(Some("http://127.0.0.1:9/hook".into()), bus).is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_notifier_publishes_nothing() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        WebhookNotifier::new(None, bus.clone())
            .notify("Updated server to version 1.16.0!")
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed_and_reported() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        // port 9 (discard) on loopback: nothing listens, connection is refused
        let notifier = WebhookNotifier::new(Some("http://127.0.0.1:9/hook".into()), bus.clone());

        notifier.notify("hello").await;

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::NotificationFailed);
        assert!(ev.reason.is_some());
    }
}
