//! The leaver session: the one place that wires catalog, selection, gate,
//! and executor together on behalf of a host embedding.
//!
//! The session is the only mutator of the catalog and the selection set,
//! and it rejects mutation outright while a run is active. Starting a run
//! hands an immutable plan to the executor; everything the run needs is
//! resolved up front.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock, watch};

use exodus_core::catalog::{Catalog, Guild};
use exodus_core::error::{ExodusError, Result};
use exodus_core::executor::{self, BatchExecutor, RunPlan, RunSummary};
use exodus_core::gate::{ConfirmationGate, GatePress};
use exodus_core::host::{ConfirmPrompt, ConfirmRequest, GuildGateway, Notifier};
use exodus_core::progress::ProgressSnapshot;
use exodus_core::selection::SelectionSet;
use exodus_core::settings::{Settings, SettingsRepository};

/// Pause between a run's end and the follow-up catalog refresh, so the host
/// store has settled before the stale entries are re-read.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// How a leave request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    /// The run was authorized and has started.
    Started,
    /// No modal capability: the gate is armed, awaiting a second press.
    Armed,
    /// The modal prompt was shown and declined.
    Declined,
}

/// One user's bulk-leave session against a host.
///
/// Cheap to clone: every field is reference-counted shared state, so the
/// run task and the embedding hold the same session.
#[derive(Clone)]
pub struct LeaverSession {
    gateway: Arc<dyn GuildGateway>,
    notifier: Arc<dyn Notifier>,
    prompt: Option<Arc<dyn ConfirmPrompt>>,
    settings_repository: Option<Arc<dyn SettingsRepository>>,
    executor: Arc<BatchExecutor>,
    catalog: Arc<RwLock<Catalog>>,
    selection: Arc<RwLock<SelectionSet>>,
    gate: Arc<Mutex<ConfirmationGate>>,
    delay_ms: Arc<AtomicU64>,
    last_summary: Arc<RwLock<Option<RunSummary>>>,
}

impl LeaverSession {
    /// Creates a session, restoring the persisted delay and selection.
    ///
    /// A missing or failing settings backend falls back to defaults; the
    /// session never refuses to start over persistence.
    pub async fn new(
        gateway: Arc<dyn GuildGateway>,
        notifier: Arc<dyn Notifier>,
        prompt: Option<Arc<dyn ConfirmPrompt>>,
        settings_repository: Option<Arc<dyn SettingsRepository>>,
    ) -> Self {
        let settings = match &settings_repository {
            Some(repository) => match repository.load().await {
                Ok(settings) => settings,
                Err(error) => {
                    tracing::warn!(
                        target: "exodus::session",
                        %error,
                        "failed to load settings, using defaults"
                    );
                    Settings::default()
                }
            },
            None => Settings::default(),
        };

        Self {
            executor: Arc::new(BatchExecutor::new(gateway.clone())),
            gateway,
            notifier,
            prompt,
            settings_repository,
            catalog: Arc::new(RwLock::new(Catalog::default())),
            selection: Arc::new(RwLock::new(settings.selection)),
            gate: Arc::new(Mutex::new(ConfirmationGate::new())),
            delay_ms: Arc::new(AtomicU64::new(executor::clamp_delay_ms(settings.delay_ms))),
            last_summary: Arc::new(RwLock::new(None)),
        }
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Reloads the catalog from the host.
    ///
    /// An enumeration failure is not fatal: the catalog becomes empty and
    /// the user gets one notice. Returns the number of guilds loaded.
    pub async fn refresh(&self) -> Result<usize> {
        self.ensure_idle()?;

        let catalog = match self.gateway.list_guilds().await {
            Ok(raw) => Catalog::from_raw(raw),
            Err(error) => {
                tracing::warn!(target: "exodus::session", %error, "guild listing failed");
                self.notifier.notify("Could not list guilds from the host.");
                Catalog::default()
            }
        };

        let count = catalog.len();
        *self.catalog.write().await = catalog;
        tracing::debug!(target: "exodus::session", count, "catalog refreshed");
        Ok(count)
    }

    /// The full catalog in execution order.
    pub async fn guilds(&self) -> Vec<Guild> {
        self.catalog.read().await.guilds().to_vec()
    }

    /// The catalog filtered by a case-insensitive name query.
    pub async fn filtered(&self, query: &str) -> Vec<Guild> {
        self.catalog.read().await.filter(query)
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub async fn selected_count(&self) -> usize {
        self.selection.read().await.count()
    }

    pub async fn is_selected(&self, id: &str) -> bool {
        self.selection.read().await.is_selected(id)
    }

    /// Flips one guild's selection. Rejected while a run is active.
    pub async fn toggle(&self, id: &str) -> Result<bool> {
        self.ensure_idle()?;

        let state = {
            let mut selection = self.selection.write().await;
            selection.toggle(id)
        };
        self.persist_settings().await;
        Ok(state)
    }

    /// Selects every guild matching the query (all guilds for a blank
    /// query). Returns the total selected count afterwards.
    pub async fn select_filtered(&self, query: &str) -> Result<usize> {
        self.ensure_idle()?;

        let visible = self.catalog.read().await.filter(query);
        let count = {
            let mut selection = self.selection.write().await;
            selection.select_all(visible.iter());
            selection.count()
        };
        self.persist_settings().await;
        Ok(count)
    }

    pub async fn clear_selection(&self) -> Result<()> {
        self.ensure_idle()?;

        self.selection.write().await.clear();
        self.persist_settings().await;
        Ok(())
    }

    // ========================================================================
    // Delay
    // ========================================================================

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms.load(Ordering::SeqCst)
    }

    /// Applies a user-supplied delay value. Non-numeric or negative input
    /// coerces to 0; the result is clamped and persisted. Returns the value
    /// actually applied. A run already in flight keeps the delay it started
    /// with.
    pub async fn set_delay(&self, input: &str) -> u64 {
        let delay_ms = executor::parse_delay_ms(input);
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
        self.persist_settings().await;
        delay_ms
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Resolves a leave request through the confirmation flow.
    ///
    /// With a modal capability the decision is delegated to it; otherwise
    /// the two-press arming gate applies. Rejected while running or with an
    /// empty selection, with a user notice either way.
    pub async fn request_leave(&self) -> Result<LeaveDecision> {
        if self.executor.is_running() {
            self.notifier.notify("Already running. Use stop to cancel.");
            return Err(ExodusError::AlreadyRunning);
        }

        let count = {
            let catalog = self.catalog.read().await;
            let selection = self.selection.read().await;
            selection.run_request(&catalog).len()
        };
        if count == 0 {
            self.notifier.notify("Select at least 1 guild.");
            return Err(ExodusError::EmptySelection);
        }

        if let Some(prompt) = &self.prompt {
            if prompt.confirm(&ConfirmRequest::leave_guilds(count)).await {
                self.start_run().await?;
                return Ok(LeaveDecision::Started);
            }
            tracing::debug!(target: "exodus::session", "leave declined via prompt");
            return Ok(LeaveDecision::Declined);
        }

        let press = self.gate.lock().await.press(Instant::now());
        match press {
            GatePress::Armed => {
                self.notifier.notify(&format!(
                    "Press again to confirm leaving {count} guild(s)"
                ));
                Ok(LeaveDecision::Armed)
            }
            GatePress::Authorized => {
                self.start_run().await?;
                Ok(LeaveDecision::Started)
            }
        }
    }

    /// Requests cancellation of the active run; lets the current guild
    /// finish. Returns whether a run was signalled.
    pub async fn stop(&self) -> bool {
        if self.executor.stop().await {
            self.notifier.notify("Stopping after the current guild...");
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.executor.is_running()
    }

    /// Subscribes to progress snapshots for the active (and future) runs.
    pub fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.executor.subscribe()
    }

    pub fn latest_progress(&self) -> ProgressSnapshot {
        self.executor.latest_progress()
    }

    /// The report of the most recently finished run, if any.
    pub async fn last_summary(&self) -> Option<RunSummary> {
        self.last_summary.read().await.clone()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_idle(&self) -> Result<()> {
        if self.executor.is_running() {
            return Err(ExodusError::AlreadyRunning);
        }
        Ok(())
    }

    /// Builds the run plan from the current catalog order and spawns the
    /// executor task.
    async fn start_run(&self) -> Result<()> {
        let plan = {
            let catalog = self.catalog.read().await;
            let selection = self.selection.read().await;
            let ids = selection.run_request(&catalog);
            let names = ids
                .iter()
                .filter_map(|id| {
                    catalog
                        .name_of(id)
                        .map(|name| (id.clone(), name.to_string()))
                })
                .collect();
            RunPlan::new(ids, names, self.delay_ms())
        };
        if plan.is_empty() {
            self.notifier.notify("Select at least 1 guild.");
            return Err(ExodusError::EmptySelection);
        }

        self.gate.lock().await.disarm();

        let session = self.clone();
        tokio::spawn(async move {
            match session.executor.run(plan).await {
                Ok(summary) => session.finish_run(summary).await,
                // Lost the race against another authorized press; the other
                // run owns the executor.
                Err(error) => {
                    tracing::debug!(target: "exodus::session", %error, "run not started")
                }
            }
        });

        Ok(())
    }

    async fn finish_run(&self, summary: RunSummary) {
        self.notifier.notify(&completion_message(&summary));
        *self.last_summary.write().await = Some(summary);

        // Stale entries (now actually left) disappear on the next load.
        tokio::time::sleep(SETTLE_DELAY).await;
        if let Err(error) = self.refresh().await {
            tracing::debug!(target: "exodus::session", %error, "post-run refresh skipped");
        }
    }

    async fn persist_settings(&self) {
        let Some(repository) = &self.settings_repository else {
            return;
        };

        let settings = Settings {
            delay_ms: self.delay_ms(),
            selection: self.selection.read().await.clone(),
        };
        if let Err(error) = repository.save(&settings).await {
            tracing::warn!(target: "exodus::session", %error, "failed to persist settings");
        }
    }
}

/// The user-facing report line, distinct for the cancelled and completed
/// cases.
fn completion_message(summary: &RunSummary) -> String {
    if summary.cancelled {
        format!("Stopped. Left {}/{} so far.", summary.left(), summary.done)
    } else {
        format!("Done. Left {}/{}.", summary.left(), summary.done)
    }
}
