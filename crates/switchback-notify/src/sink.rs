//! Notification sinks.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum subject length accepted by the notification transport.
pub const SUBJECT_LIMIT: usize = 100;

/// Truncate a subject to the transport limit, on a character boundary.
pub fn truncate_subject(subject: &str) -> String {
    subject.chars().take(SUBJECT_LIMIT).collect()
}

/// Errors constructing a sink. Delivery itself never errors out.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),
}

/// Best-effort, fire-and-forget notification delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a human-readable notification. Must not fail the caller;
    /// implementations absorb and log their own delivery errors.
    async fn notify(&self, subject: &str, body: &str);
}

// ── Webhook ────────────────────────────────────────────────────────

/// POSTs notifications as JSON to a configured webhook URL.
pub struct WebhookSink {
    url: http::Uri,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let url: http::Uri = url
            .parse()
            .map_err(|e| NotifyError::InvalidUrl(format!("{url}: {e}")))?;
        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self { url, client })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, subject: &str, body: &str) {
        let subject = truncate_subject(subject);
        let payload = serde_json::json!({
            "subject": subject,
            "body": body,
        });

        let request = http::Request::builder()
            .method("POST")
            .uri(self.url.clone())
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(payload.to_string())));
        let request = match request {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, %subject, "failed to build notification request");
                return;
            }
        };

        match self.client.request(request).await {
            Ok(resp) if resp.status().is_success() => {
                debug!(%subject, "notification delivered");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), %subject, "notification rejected by webhook");
            }
            Err(e) => {
                warn!(error = %e, %subject, "notification delivery failed");
            }
        }
    }
}

// ── Log ────────────────────────────────────────────────────────────

/// Emits notifications through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, subject: &str, body: &str) {
        let subject = truncate_subject(subject);
        info!(%subject, "notification");
        debug!(%body, "notification body");
    }
}

// ── Collecting (test double) ───────────────────────────────────────

/// A delivered notification, as seen by [`CollectingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Records notifications in memory; used in tests across the workspace.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: std::sync::Mutex<Vec<Notification>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.messages
            .lock()
            .expect("collecting sink lock poisoned")
            .clone()
    }

    /// Subjects only, in delivery order.
    pub fn subjects(&self) -> Vec<String> {
        self.notifications()
            .into_iter()
            .map(|n| n.subject)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for CollectingSink {
    async fn notify(&self, subject: &str, body: &str) {
        self.messages
            .lock()
            .expect("collecting sink lock poisoned")
            .push(Notification {
                subject: truncate_subject(subject),
                body: body.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_at_limit() {
        let long = "x".repeat(250);
        let truncated = truncate_subject(&long);
        assert_eq!(truncated.chars().count(), SUBJECT_LIMIT);
    }

    #[test]
    fn truncation_keeps_short_subjects_intact() {
        assert_eq!(truncate_subject("DR Failover Completed"), "DR Failover Completed");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let subject = "ü".repeat(150);
        let truncated = truncate_subject(&subject);
        assert_eq!(truncated.chars().count(), SUBJECT_LIMIT);
        assert!(truncated.chars().all(|c| c == 'ü'));
    }

    #[tokio::test]
    async fn collecting_sink_records_in_order() {
        let sink = CollectingSink::new();
        sink.notify("first", "body one").await;
        sink.notify("second", "body two").await;

        let delivered = sink.notifications();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].subject, "first");
        assert_eq!(delivered[1].body, "body two");
    }

    #[tokio::test]
    async fn collecting_sink_truncates_subjects() {
        let sink = CollectingSink::new();
        sink.notify(&"s".repeat(300), "body").await;
        assert_eq!(sink.subjects()[0].len(), SUBJECT_LIMIT);
    }

    #[tokio::test]
    async fn log_sink_absorbs_everything() {
        // Nothing to assert beyond "does not panic / does not error".
        LogSink.notify("subject", "body").await;
    }

    #[test]
    fn webhook_sink_rejects_bad_url() {
        assert!(matches!(
            WebhookSink::new("not a url"),
            Err(NotifyError::InvalidUrl(_))
        ));
        assert!(WebhookSink::new("http://hooks.internal/dr").is_ok());
    }

    #[tokio::test]
    async fn webhook_delivery_failure_is_absorbed() {
        // Nothing listens on this port; notify must still return.
        let sink = WebhookSink::new("http://127.0.0.1:1/hook").unwrap();
        sink.notify("subject", "body").await;
    }
}
