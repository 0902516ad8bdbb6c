//! Sequential batch-leave executor.
//!
//! Drives an ordered work list through the host's `leave` call one guild at
//! a time: cooperative cancellation at defined points, per-step failure
//! isolation, an inter-step throttle delay against the host's rate limits,
//! and a fresh progress snapshot after every step. Exactly one run can be
//! active at a time; `stop()` lets the current guild finish and halts the
//! loop at the next check, so no guild is ever left half-processed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ExodusError, Result};
use crate::host::GuildGateway;
use crate::progress::{ProgressReporter, ProgressSnapshot};

/// Upper bound for the inter-step delay.
pub const MAX_DELAY_MS: u64 = 10_000;

/// Clamps a delay in milliseconds into `[0, MAX_DELAY_MS]`.
pub fn clamp_delay_ms(delay_ms: u64) -> u64 {
    delay_ms.min(MAX_DELAY_MS)
}

/// Parses a user-supplied delay value.
///
/// Negative or non-numeric input yields 0; positive values out of integer
/// range clamp to [`MAX_DELAY_MS`].
pub fn parse_delay_ms(input: &str) -> u64 {
    let trimmed = input.trim();
    match trimmed.parse::<i64>() {
        Ok(n) if n <= 0 => 0,
        Ok(n) => clamp_delay_ms(n as u64),
        Err(_) => {
            if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                MAX_DELAY_MS
            } else {
                0
            }
        }
    }
}

/// A resolved, ordered work list for one run.
///
/// Ids come from the catalog order restricted to the selection; names are
/// resolved up front so progress can show what is about to happen even if
/// the catalog changes mid-run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    ids: Vec<String>,
    names: HashMap<String, String>,
    delay: Duration,
}

impl RunPlan {
    pub fn new(ids: Vec<String>, names: HashMap<String, String>, delay_ms: u64) -> Self {
        Self {
            ids,
            names,
            delay: Duration::from_millis(clamp_delay_ms(delay_ms)),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Display name for an id, falling back to the raw id.
    fn display_name(&self, id: &str) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

/// The terminal report of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total: usize,
    /// Guilds processed (successfully or not) before the loop ended.
    pub done: usize,
    pub failed: usize,
    /// Whether the run ended through `stop()` rather than completion.
    pub cancelled: bool,
    /// RFC3339 timestamp of the run's end.
    pub finished_at: String,
}

impl RunSummary {
    /// Count of guilds actually left.
    pub fn left(&self) -> usize {
        self.done - self.failed
    }
}

/// Executes batch-leave runs against a [`GuildGateway`].
///
/// The executor is the sole owner of run state and the sole producer of
/// progress snapshots. Leave calls are intentionally serialized: the whole
/// point of the inter-step delay is to throttle the call rate against a
/// rate-limited remote service.
pub struct BatchExecutor {
    gateway: Arc<dyn GuildGateway>,
    reporter: ProgressReporter,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl BatchExecutor {
    pub fn new(gateway: Arc<dyn GuildGateway>) -> Self {
        Self {
            gateway,
            reporter: ProgressReporter::new(),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    /// Whether a run is currently in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribes to progress snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.reporter.subscribe()
    }

    /// The most recent progress snapshot.
    pub fn latest_progress(&self) -> ProgressSnapshot {
        self.reporter.latest()
    }

    /// Requests cancellation of the active run.
    ///
    /// Idempotent. The current leave call is allowed to finish; the loop
    /// honors the request at its next check. Returns whether there was a run
    /// to signal.
    pub async fn stop(&self) -> bool {
        let cancel = self.cancel.lock().await;
        match cancel.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Runs the plan to completion or cancellation.
    ///
    /// Returns `Err(AlreadyRunning)` if a run is active; per-guild failures
    /// are counted in the summary, never escalated.
    pub async fn run(&self, plan: RunPlan) -> Result<RunSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ExodusError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *self.cancel.lock().await = Some(token.clone());

        let run_id = Uuid::new_v4();
        let total = plan.len();
        tracing::info!(
            target: "exodus::executor",
            %run_id,
            total,
            delay_ms = plan.delay.as_millis() as u64,
            "starting leave run"
        );

        self.reporter.publish(ProgressSnapshot {
            total,
            done: 0,
            failed: 0,
            current: String::new(),
        });

        let mut done = 0usize;
        let mut failed = 0usize;
        let mut cancelled = false;

        for (index, id) in plan.ids.iter().enumerate() {
            // A stop requested during the previous delay is honored here,
            // before this guild is touched.
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            self.reporter.publish(ProgressSnapshot {
                total,
                done: index,
                failed,
                current: plan.display_name(id),
            });

            if let Err(error) = self.gateway.leave_guild(id).await {
                failed += 1;
                tracing::warn!(
                    target: "exodus::executor",
                    %run_id,
                    guild_id = %id,
                    %error,
                    "leave failed"
                );
            }
            done = index + 1;

            // Publish counts before sleeping so a stop issued during the
            // delay still observes an accurate snapshot.
            self.reporter.publish(ProgressSnapshot {
                total,
                done,
                failed,
                current: String::new(),
            });

            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            if !plan.delay.is_zero() && index + 1 < total {
                tokio::time::sleep(plan.delay).await;
            }
        }

        *self.cancel.lock().await = None;
        self.running.store(false, Ordering::SeqCst);

        let summary = RunSummary {
            run_id,
            total,
            done,
            failed,
            cancelled,
            finished_at: chrono::Utc::now().to_rfc3339(),
        };

        self.reporter.publish(ProgressSnapshot {
            total,
            done,
            failed,
            current: String::new(),
        });
        tracing::info!(
            target: "exodus::executor",
            %run_id,
            done,
            failed,
            cancelled,
            "leave run finished"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;

    /// Gateway whose `leave_guild` waits for a test-issued permit before
    /// completing, so tests control exactly where the run loop is parked.
    struct MockGateway {
        permits: Arc<Semaphore>,
        failing: HashSet<String>,
        left: StdMutex<Vec<String>>,
    }

    impl MockGateway {
        fn unbounded() -> Arc<Self> {
            Self::with_permits(Semaphore::MAX_PERMITS)
        }

        fn with_permits(permits: usize) -> Arc<Self> {
            Arc::new(Self {
                permits: Arc::new(Semaphore::new(permits)),
                failing: HashSet::new(),
                left: StdMutex::new(Vec::new()),
            })
        }

        fn failing_on(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                permits: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
                failing: ids.iter().map(|id| id.to_string()).collect(),
                left: StdMutex::new(Vec::new()),
            })
        }

        fn release(&self, count: usize) {
            self.permits.add_permits(count);
        }

        fn left_ids(&self) -> Vec<String> {
            self.left.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl GuildGateway for MockGateway {
        async fn list_guilds(&self) -> Result<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }

        async fn leave_guild(&self, guild_id: &str) -> Result<()> {
            let permit = self.permits.acquire().await.expect("semaphore closed");
            permit.forget();
            if self.failing.contains(guild_id) {
                return Err(ExodusError::gateway(format!("refused: {guild_id}")));
            }
            self.left.lock().unwrap().push(guild_id.to_string());
            Ok(())
        }
    }

    fn plan(ids: &[&str], delay_ms: u64) -> RunPlan {
        let names = ids
            .iter()
            .map(|id| (id.to_string(), format!("Guild {id}")))
            .collect();
        RunPlan::new(ids.iter().map(|id| id.to_string()).collect(), names, delay_ms)
    }

    #[test]
    fn test_clamp_delay_bounds() {
        assert_eq!(clamp_delay_ms(0), 0);
        assert_eq!(clamp_delay_ms(900), 900);
        assert_eq!(clamp_delay_ms(10_000), 10_000);
        assert_eq!(clamp_delay_ms(999_999), 10_000);
    }

    #[test]
    fn test_parse_delay_rejects_garbage_and_negatives() {
        assert_eq!(parse_delay_ms("-5"), 0);
        assert_eq!(parse_delay_ms("abc"), 0);
        assert_eq!(parse_delay_ms(""), 0);
        assert_eq!(parse_delay_ms("  900 "), 900);
        assert_eq!(parse_delay_ms("999999"), 10_000);
        assert_eq!(parse_delay_ms("99999999999999999999999"), 10_000);
    }

    #[tokio::test]
    async fn test_all_successes_complete_in_order() {
        let gateway = MockGateway::unbounded();
        let executor = BatchExecutor::new(gateway.clone());

        let summary = executor.run(plan(&["a", "b", "c"], 0)).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.done, 3);
        assert_eq!(summary.failed, 0);
        assert!(!summary.cancelled);
        assert_eq!(summary.left(), 3);
        assert_eq!(gateway.left_ids(), vec!["a", "b", "c"]);
        assert!(!executor.is_running());
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let gateway = MockGateway::failing_on(&["b"]);
        let executor = BatchExecutor::new(gateway.clone());

        let summary = executor.run(plan(&["a", "b", "c"], 0)).await.unwrap();

        assert_eq!(summary.done, 3);
        assert_eq!(summary.failed, 1);
        assert!(!summary.cancelled);
        assert_eq!(summary.left(), 2);
        assert_eq!(gateway.left_ids(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_snapshots_track_the_loop() {
        let gateway = MockGateway::with_permits(0);
        let executor = Arc::new(BatchExecutor::new(gateway.clone()));

        let run = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run(plan(&["a", "b"], 0)).await })
        };

        // Parked inside the first leave call: the snapshot names the guild
        // about to be acted on and counts nothing as done yet.
        let mut rx = executor.subscribe();
        rx.wait_for(|s| s.current == "Guild a").await.unwrap();
        let before = executor.latest_progress();
        assert_eq!(before.total, 2);
        assert_eq!(before.done, 0);

        gateway.release(1);
        rx.wait_for(|s| s.current == "Guild b").await.unwrap();
        let mid = executor.latest_progress();
        assert_eq!(mid.done, 1);
        assert_eq!(mid.failed, 0);

        gateway.release(1);
        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.done, 2);

        let last = executor.latest_progress();
        assert_eq!(last.done, 2);
        assert!(last.current.is_empty());
    }

    #[tokio::test]
    async fn test_stop_lets_current_guild_finish() {
        let gateway = MockGateway::with_permits(0);
        let executor = Arc::new(BatchExecutor::new(gateway.clone()));

        let run = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run(plan(&["a", "b", "c", "d", "e"], 0)).await })
        };

        let mut rx = executor.subscribe();
        gateway.release(2);
        // Wait until the loop is parked inside the third leave call.
        rx.wait_for(|s| s.current == "Guild c").await.unwrap();

        assert!(executor.stop().await);
        assert!(executor.stop().await); // idempotent while running

        gateway.release(1);
        let summary = run.await.unwrap().unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.done, 3);
        assert!(summary.done <= 5);
        assert_eq!(gateway.left_ids(), vec!["a", "b", "c"]);
        assert!(!executor.is_running());
    }

    #[tokio::test]
    async fn test_stop_during_delay_skips_the_next_guild() {
        let gateway = MockGateway::with_permits(0);
        let executor = Arc::new(BatchExecutor::new(gateway.clone()));

        // Delay wide enough that the stop lands while the loop sleeps.
        let run = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run(plan(&["a", "b"], 300)).await })
        };

        let mut rx = executor.subscribe();
        gateway.release(1);
        rx.wait_for(|s| s.done == 1).await.unwrap();

        executor.stop().await;
        let summary = run.await.unwrap().unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.done, 1);
        assert_eq!(gateway.left_ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_overlapping_run_is_refused() {
        let gateway = MockGateway::with_permits(0);
        let executor = Arc::new(BatchExecutor::new(gateway.clone()));

        let run = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run(plan(&["a"], 0)).await })
        };

        let mut rx = executor.subscribe();
        rx.wait_for(|s| s.current == "Guild a").await.unwrap();

        let second = executor.run(plan(&["b"], 0)).await;
        assert!(matches!(second, Err(ExodusError::AlreadyRunning)));

        gateway.release(1);
        run.await.unwrap().unwrap();

        // With the first run finished, a new run is accepted again.
        gateway.release(1);
        let third = executor.run(plan(&["b"], 0)).await.unwrap();
        assert_eq!(third.done, 1);
    }

    #[tokio::test]
    async fn test_stop_without_active_run_is_a_noop() {
        let gateway = MockGateway::unbounded();
        let executor = BatchExecutor::new(gateway);

        assert!(!executor.stop().await);
    }

    #[tokio::test]
    async fn test_unknown_name_falls_back_to_id() {
        let gateway = MockGateway::with_permits(0);
        let executor = Arc::new(BatchExecutor::new(gateway.clone()));

        let bare = RunPlan::new(vec!["raw-id".to_string()], HashMap::new(), 0);
        let run = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run(bare).await })
        };

        let mut rx = executor.subscribe();
        rx.wait_for(|s| s.current == "raw-id").await.unwrap();

        gateway.release(1);
        run.await.unwrap().unwrap();
    }
}
