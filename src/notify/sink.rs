//! Log-backed notification sink.

use async_trait::async_trait;

use super::{Notification, NotificationKind, NotificationSink};

/// Push channel that reports notifications through the log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "push"
    }

    async fn deliver(&self, notification: &Notification) -> bool {
        match notification.kind {
            NotificationKind::Failure => {
                let failed: Vec<&str> = notification.failed().map(|r| r.name.as_str()).collect();
                tracing::warn!(
                    "Push notification: {} [{}]",
                    notification.subject(),
                    failed.join(", ")
                );
            }
            NotificationKind::Recovery => {
                tracing::info!("Push notification: {}", notification.subject());
            }
        }
        true
    }
}
