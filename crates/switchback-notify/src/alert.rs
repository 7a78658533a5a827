//! Alert events produced by health evaluation and orchestration.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sink::NotificationSink;

/// How urgent an alert is. Transient; severity is carried for logging and
/// webhook payload context, not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A single alert condition, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub severity: Severity,
    pub subject: String,
    pub body: String,
}

impl AlertEvent {
    pub fn new(severity: Severity, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Log the alert and hand it to the sink.
    pub async fn dispatch(&self, sink: &dyn NotificationSink) {
        match self.severity {
            Severity::Critical | Severity::Warning => {
                warn!(severity = %self.severity, subject = %self.subject, "alert");
            }
            Severity::Info => {
                info!(subject = %self.subject, "alert");
            }
        }
        sink.notify(&self.subject, &self.body).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;

    #[tokio::test]
    async fn dispatch_delivers_to_sink() {
        let sink = CollectingSink::new();
        let alert = AlertEvent::new(
            Severity::Critical,
            "DR Alert: Primary Endpoint Unhealthy",
            "Primary endpoint is not responding.",
        );
        alert.dispatch(&sink).await;

        let delivered = sink.notifications();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].subject, "DR Alert: Primary Endpoint Unhealthy");
    }

    #[test]
    fn severity_displays_lowercase() {
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
