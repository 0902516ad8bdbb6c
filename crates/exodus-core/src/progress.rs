//! Progress reporting for a batch run.
//!
//! The executor produces a fresh snapshot after every step; readers always
//! observe a complete value that was valid at some instant of the run.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// One instant of a run: `0 <= failed <= done <= total`.
///
/// `current` carries the display name of the guild about to be acted on and
/// is empty between steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub current: String,
}

impl ProgressSnapshot {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.done)
    }
}

/// Holds the latest snapshot and fans it out to observers.
///
/// Built on a `watch` channel: each publish replaces the previous value
/// atomically, so a polling reader never sees a torn update.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<ProgressSnapshot>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::default());
        Self { tx }
    }

    /// Subscribes to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Publishes a new snapshot. `send_replace` keeps the value available
    /// even when no subscriber is attached.
    pub(crate) fn publish(&self, snapshot: ProgressSnapshot) {
        self.tx.send_replace(snapshot);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_reflects_last_publish() {
        let reporter = ProgressReporter::new();
        assert_eq!(reporter.latest(), ProgressSnapshot::default());

        reporter.publish(ProgressSnapshot {
            total: 3,
            done: 1,
            failed: 0,
            current: "Alpha".to_string(),
        });

        let latest = reporter.latest();
        assert_eq!(latest.total, 3);
        assert_eq!(latest.done, 1);
        assert_eq!(latest.current, "Alpha");
        assert_eq!(latest.remaining(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_observes_updates() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();

        reporter.publish(ProgressSnapshot {
            total: 2,
            done: 2,
            failed: 1,
            current: String::new(),
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().done, 2);
        assert_eq!(rx.borrow().failed, 1);
    }

    #[test]
    fn test_publish_without_subscribers_does_not_lose_value() {
        let reporter = ProgressReporter::new();
        reporter.publish(ProgressSnapshot {
            total: 1,
            done: 1,
            failed: 0,
            current: String::new(),
        });

        assert_eq!(reporter.latest().done, 1);
    }
}
