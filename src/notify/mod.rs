//! Notification module.
//!
//! The gate decides whether a cycle's results deserve a notification; sinks
//! deliver it. At most one aggregated notification is produced per cycle.

mod gate;
mod sink;

pub use gate::*;
pub use sink::*;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

use crate::probe::CheckResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Failure,
    Recovery,
}

/// One aggregated notification covering a whole cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub results: Vec<CheckResult>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, results: Vec<CheckResult>) -> Self {
        Self {
            kind,
            results,
            created_at: Utc::now(),
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn subject(&self) -> String {
        match self.kind {
            NotificationKind::Failure => {
                format!("API Issues Detected ({})", self.failed().count())
            }
            NotificationKind::Recovery => "APIs Recovered".to_string(),
        }
    }

    /// Plain-text body listing failed and working endpoints.
    pub fn text_body(&self) -> String {
        let checked_at = self.created_at.with_timezone(&Local);
        let mut body = String::new();
        let _ = writeln!(body, "API Monitoring Status");
        let _ = writeln!(body, "Check time: {}", checked_at.format("%Y-%m-%d %H:%M:%S"));

        let failed: Vec<_> = self.failed().collect();
        if !failed.is_empty() {
            let _ = writeln!(body, "\nFailed APIs ({}):", failed.len());
            for r in failed {
                let _ = writeln!(body, "  - {} ({})", r.name, r.url);
                let _ = writeln!(body, "    Error: {}", r.error.as_deref().unwrap_or("Unknown error"));
                if let Some(code) = r.status_code {
                    let _ = writeln!(body, "    HTTP code: {}", code);
                }
            }
        }

        let working: Vec<_> = self.results.iter().filter(|r| r.success).collect();
        if !working.is_empty() {
            let _ = writeln!(body, "\nWorking APIs ({}):", working.len());
            for r in working {
                let _ = writeln!(body, "  - {} ({})", r.name, r.url);
                let _ = writeln!(body, "    Latency: {:.2} ms", r.latency_ms);
            }
        }

        body
    }
}

/// Delivery channel for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver a notification. Returns false when delivery failed.
    async fn deliver(&self, notification: &Notification) -> bool;
}

/// Gate plus the sinks its notifications go to.
pub struct Notifier {
    gate: NotificationGate,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(policy: NotificationPolicy) -> Self {
        Self {
            gate: NotificationGate::new(policy),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    /// Evaluate a cycle and deliver the resulting notification, if any.
    ///
    /// Returns whether a notification was sent. Delivery failures are logged
    /// and otherwise ignored.
    pub async fn notify(&mut self, results: &[CheckResult]) -> bool {
        let Some(notification) = self.gate.evaluate(results) else {
            return false;
        };

        tracing::info!("Sending notification: {}", notification.subject());
        for sink in &self.sinks {
            if !sink.deliver(&notification).await {
                tracing::error!("Failed to deliver notification via {}", sink.name());
            }
        }

        true
    }
}
