//! Per-endpoint notification state.

use std::collections::{HashMap, HashSet};

use super::{Notification, NotificationKind};
use crate::probe::CheckResult;

/// Which state changes are worth a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPolicy {
    pub on_failure: bool,
    pub on_recovery: bool,
    /// Notify on every failing cycle instead of only on transitions.
    pub on_every_failure: bool,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            on_failure: true,
            on_recovery: true,
            on_every_failure: false,
        }
    }
}

/// Edge-triggered notification gate.
///
/// Remembers the last notified state of each endpoint by name. An endpoint
/// with no entry has never been notified about.
#[derive(Debug, Default)]
pub struct NotificationGate {
    policy: NotificationPolicy,
    last_notified: HashMap<String, bool>,
}

impl NotificationGate {
    pub fn new(policy: NotificationPolicy) -> Self {
        Self {
            policy,
            last_notified: HashMap::new(),
        }
    }

    /// Last notified state for `name`: `Some(true)` after a failure notice.
    pub fn last_state(&self, name: &str) -> Option<bool> {
        self.last_notified.get(name).copied()
    }

    /// Decide whether `name` in state `is_failed` warrants a notification,
    /// recording the state when it does.
    pub fn should_notify(&mut self, name: &str, is_failed: bool) -> bool {
        if is_failed && !self.policy.on_failure {
            return false;
        }
        if !is_failed && !self.policy.on_recovery {
            return false;
        }

        if is_failed && self.policy.on_every_failure {
            self.last_notified.insert(name.to_string(), true);
            return true;
        }

        match self.last_notified.get(name) {
            Some(&last) if last == is_failed => false,
            _ => {
                self.last_notified.insert(name.to_string(), is_failed);
                true
            }
        }
    }

    /// Decide on at most one notification for a whole cycle.
    ///
    /// Any fresh failure yields a failure notice. Otherwise, endpoints that
    /// were last notified as failed and now succeed yield a recovery notice.
    /// Endpoints with no history never count as recovered. State for
    /// endpoints missing from `results` is dropped.
    pub fn evaluate(&mut self, results: &[CheckResult]) -> Option<Notification> {
        let present: HashSet<&str> = results.iter().map(|r| r.name.as_str()).collect();
        self.last_notified.retain(|name, _| present.contains(name.as_str()));

        let has_failures = results.iter().any(|r| !r.success);

        let kind = if has_failures {
            let fresh = results
                .iter()
                .filter(|r| !r.success)
                .any(|r| self.should_notify(&r.name, true));
            fresh.then_some(NotificationKind::Failure)?
        } else {
            let mut recovered = false;
            for result in results {
                if self.last_state(&result.name) == Some(true)
                    && self.should_notify(&result.name, false)
                {
                    recovered = true;
                }
            }
            recovered.then_some(NotificationKind::Recovery)?
        };

        Some(Notification::new(kind, results.to_vec()))
    }
}
