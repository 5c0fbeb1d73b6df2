//! Live monitoring data served by the dashboard.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::notify::{Notification, NotificationKind, NotificationSink};
use crate::probe::CheckResult;
use crate::report::{ReportError, ReportSink};

/// Number of cycles kept in the history ring.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub results: Vec<CheckResult>,
}

/// Failure alert waiting to be picked up by a browser.
#[derive(Debug, Clone, Serialize)]
pub struct PushAlert {
    pub title: String,
    pub body: String,
    pub failed: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    results: Vec<CheckResult>,
    history: VecDeque<HistoryEntry>,
    stats: MonitorStats,
    pending_alert: Option<PushAlert>,
}

/// Dashboard state, fed by the scheduler as a report and notification sink.
#[derive(Debug)]
pub struct MonitorState {
    inner: RwLock<Inner>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                results: Vec::new(),
                history: VecDeque::with_capacity(HISTORY_LIMIT),
                stats: MonitorStats {
                    total_checks: 0,
                    successful_checks: 0,
                    failed_checks: 0,
                    last_check: None,
                    start_time: Utc::now(),
                },
                pending_alert: None,
            }),
        }
    }

    /// Record one cycle's results.
    pub async fn record(&self, results: &[CheckResult]) {
        let now = Utc::now();
        let successful = results.iter().filter(|r| r.success).count() as u64;

        let mut inner = self.inner.write().await;
        inner.results = results.to_vec();
        inner.history.push_back(HistoryEntry {
            timestamp: now,
            results: results.to_vec(),
        });
        while inner.history.len() > HISTORY_LIMIT {
            inner.history.pop_front();
        }

        let stats = &mut inner.stats;
        stats.total_checks += 1;
        stats.successful_checks += successful;
        stats.failed_checks += results.len() as u64 - successful;
        stats.last_check = Some(now);
    }

    pub async fn results(&self) -> Vec<CheckResult> {
        self.inner.read().await.results.clone()
    }

    pub async fn stats(&self) -> MonitorStats {
        self.inner.read().await.stats.clone()
    }

    /// History, oldest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.inner.read().await.history.iter().cloned().collect()
    }

    /// Take the pending alert, leaving none behind.
    pub async fn take_alert(&self) -> Option<PushAlert> {
        self.inner.write().await.pending_alert.take()
    }
}

#[async_trait]
impl ReportSink for MonitorState {
    async fn publish(&self, results: &[CheckResult]) -> Result<(), ReportError> {
        self.record(results).await;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MonitorState {
    fn name(&self) -> &str {
        "dashboard"
    }

    async fn deliver(&self, notification: &Notification) -> bool {
        // Browsers only get alerted about failures
        if notification.kind != NotificationKind::Failure {
            return true;
        }

        let failed: Vec<String> = notification.failed().map(|r| r.name.clone()).collect();
        let alert = PushAlert {
            title: notification.subject(),
            body: format!("Failed: {}", failed.join(", ")),
            failed,
            timestamp: notification.created_at,
        };

        self.inner.write().await.pending_alert = Some(alert);
        true
    }
}
