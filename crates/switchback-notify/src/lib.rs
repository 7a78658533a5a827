//! switchback-notify — operator notifications for the DR control plane.
//!
//! Notification is observability, not correctness: every sink is
//! best-effort and fire-and-forget. Delivery failures are logged locally
//! and never abort a health cycle or an orchestration run.
//!
//! # Sinks
//!
//! - [`WebhookSink`] — POSTs `{subject, body}` JSON to a configured URL
//! - [`LogSink`] — emits through `tracing` only (the default when no
//!   webhook is configured)
//! - [`CollectingSink`] — records notifications in memory for assertions
//!
//! Subjects are truncated to the transport limit ([`SUBJECT_LIMIT`])
//! before leaving the process.

pub mod alert;
pub mod sink;

pub use alert::{AlertEvent, Severity};
pub use sink::{
    CollectingSink, LogSink, Notification, NotificationSink, NotifyError, SUBJECT_LIMIT,
    WebhookSink, truncate_subject,
};
