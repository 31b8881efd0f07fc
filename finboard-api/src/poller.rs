//! Statement processing poller.
//!
//! Each statement id gets its own tokio task that polls
//! `/statements/{id}/status` on a fixed interval until the action is
//! finished. Tasks are independent: cancelling or finishing one leaves the
//! others running. Progress is reported over an unbounded channel so a UI
//! loop (or the CLI) can render it.
//!
//! A task either follows an action it started ([`StatementPoller::trigger`])
//! or only observes ([`StatementPoller::watch`]). Observing never calls a
//! processing endpoint.

use finboard_core::{ProcessingAction, Statement, StatementBadge};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::QueryCache;
use crate::client::ApiClient;
use crate::error::{ApiError, Result};
use crate::notify::Notification;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Consecutive failed status calls before a poll task gives up.
    pub max_consecutive_errors: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// `action` is `None` for a watch-only task.
    Started {
        statement_id: String,
        action: Option<ProcessingAction>,
    },
    /// Emitted whenever the badge changes.
    Progress {
        statement_id: String,
        badge: StatementBadge,
    },
    PollFailed {
        statement_id: String,
        message: String,
        consecutive: u32,
    },
    /// Polling for this id is over. `badge` is `None` when it stopped
    /// without a final status (error ceiling or lost session).
    Finished {
        statement_id: String,
        badge: Option<StatementBadge>,
        notification: Notification,
    },
}

impl PollEvent {
    pub fn statement_id(&self) -> &str {
        match self {
            PollEvent::Started { statement_id, .. }
            | PollEvent::Progress { statement_id, .. }
            | PollEvent::PollFailed { statement_id, .. }
            | PollEvent::Finished { statement_id, .. } => statement_id,
        }
    }
}

struct ActiveTask {
    generation: u64,
    /// `None` while the start request is still in flight.
    handle: Option<JoinHandle<()>>,
}

impl ActiveTask {
    fn is_live(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| !h.is_finished())
    }
}

#[derive(Default)]
struct ActiveSet {
    next_generation: u64,
    tasks: HashMap<String, ActiveTask>,
}

type Shared = Arc<Mutex<ActiveSet>>;

fn lock(active: &Shared) -> MutexGuard<'_, ActiveSet> {
    active.lock().unwrap_or_else(|p| p.into_inner())
}

/// Claim on an id taken before any await. Dropping it unspawned releases
/// the id again.
struct Reservation<'a> {
    active: &'a Shared,
    statement_id: &'a str,
    generation: u64,
    armed: bool,
}

impl<'a> Reservation<'a> {
    fn take(active: &'a Shared, statement_id: &'a str) -> Option<Self> {
        let mut set = lock(active);
        if set.tasks.get(statement_id).is_some_and(ActiveTask::is_live) {
            return None;
        }
        set.next_generation += 1;
        let generation = set.next_generation;
        set.tasks.insert(
            statement_id.to_string(),
            ActiveTask {
                generation,
                handle: None,
            },
        );
        Some(Self {
            active,
            statement_id,
            generation,
            armed: true,
        })
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut set = lock(self.active);
        if set
            .tasks
            .get(self.statement_id)
            .is_some_and(|t| t.generation == self.generation && t.handle.is_none())
        {
            set.tasks.remove(self.statement_id);
        }
    }
}

pub struct StatementPoller {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
    config: PollerConfig,
    events: mpsc::UnboundedSender<PollEvent>,
    active: Shared,
}

impl StatementPoller {
    pub fn new(
        client: Arc<ApiClient>,
        cache: Arc<QueryCache>,
        config: PollerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let poller = Self {
            client,
            cache,
            config,
            events,
            active: Arc::new(Mutex::new(ActiveSet::default())),
        };
        (poller, rx)
    }

    /// Request `action` on the backend, then poll until it finishes.
    ///
    /// Returns `Ok(false)` without calling the backend if the statement is
    /// already being polled or being started. The id stays claimed while
    /// the start request is in flight.
    pub async fn trigger(&self, statement_id: &str, action: ProcessingAction) -> Result<bool> {
        let Some(reservation) = Reservation::take(&self.active, statement_id) else {
            tracing::debug!(statement = statement_id, "already polling; trigger ignored");
            return Ok(false);
        };
        self.client.start_processing(statement_id, action).await?;
        Ok(self.spawn(reservation, Some(action)))
    }

    /// Observe a statement whose processing was started elsewhere, until its
    /// badge settles (anything but Extracting or Categorizing). Never starts
    /// a backend step. Returns false when the id is already being polled.
    pub fn watch(&self, statement_id: &str) -> bool {
        match Reservation::take(&self.active, statement_id) {
            Some(reservation) => self.spawn(reservation, None),
            None => false,
        }
    }

    fn spawn(&self, mut reservation: Reservation<'_>, action: Option<ProcessingAction>) -> bool {
        reservation.armed = false;
        let statement_id = reservation.statement_id;
        let generation = reservation.generation;

        let mut active = lock(&self.active);
        let Some(slot) = active
            .tasks
            .get_mut(statement_id)
            .filter(|t| t.generation == generation)
        else {
            // Cancelled while the start request was in flight.
            return false;
        };

        let task = PollTask {
            statement_id: statement_id.to_string(),
            action,
            generation,
            client: Arc::clone(&self.client),
            cache: Arc::clone(&self.cache),
            config: self.config,
            events: self.events.clone(),
            active: Arc::clone(&self.active),
        };
        let _ = self.events.send(PollEvent::Started {
            statement_id: statement_id.to_string(),
            action,
        });
        slot.handle = Some(tokio::spawn(task.run()));
        tracing::info!(statement = statement_id, ?action, "polling started");
        true
    }

    /// Stop polling one statement. Others are unaffected.
    pub fn cancel(&self, statement_id: &str) -> bool {
        match lock(&self.active).tasks.remove(statement_id) {
            Some(task) => {
                if let Some(handle) = task.handle {
                    handle.abort();
                }
                tracing::info!(statement = statement_id, "polling cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for handle in lock(&self.active).tasks.drain().filter_map(|(_, t)| t.handle) {
            handle.abort();
        }
    }

    pub fn is_polling(&self, statement_id: &str) -> bool {
        lock(&self.active)
            .tasks
            .get(statement_id)
            .is_some_and(ActiveTask::is_live)
    }

    pub fn active_ids(&self) -> Vec<String> {
        let active = lock(&self.active);
        let mut ids: Vec<String> = active
            .tasks
            .iter()
            .filter(|(_, t)| t.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl Drop for StatementPoller {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct PollTask {
    statement_id: String,
    action: Option<ProcessingAction>,
    generation: u64,
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
    config: PollerConfig,
    events: mpsc::UnboundedSender<PollEvent>,
    active: Shared,
}

impl PollTask {
    async fn run(self) {
        let id = self.statement_id.as_str();
        let mut last_badge: Option<StatementBadge> = None;
        let mut consecutive_errors = 0u32;
        let mut followed_up = false;

        loop {
            tokio::time::sleep(self.config.interval).await;

            let statement = match self.client.statement_status(id).await {
                Ok(s) => s,
                Err(e @ ApiError::Unauthorized { .. }) => {
                    self.finish(None, Notification::from_error("Polling stopped", &e));
                    return;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(statement = id, error = %e, consecutive_errors, "status poll failed");
                    let _ = self.events.send(PollEvent::PollFailed {
                        statement_id: id.to_string(),
                        message: e.user_message(),
                        consecutive: consecutive_errors,
                    });
                    if consecutive_errors >= self.config.max_consecutive_errors {
                        self.cache.invalidate("statements");
                        self.finish(
                            None,
                            Notification::error(
                                "Could not track processing",
                                format!("Gave up after {consecutive_errors} failed status checks"),
                            ),
                        );
                        return;
                    }
                    continue;
                }
            };
            consecutive_errors = 0;

            let badge = statement.badge();
            if last_badge != Some(badge) {
                tracing::debug!(statement = id, %badge, "badge changed");
                let _ = self.events.send(PollEvent::Progress {
                    statement_id: id.to_string(),
                    badge,
                });
                last_badge = Some(badge);
            }

            if self.is_finished(&statement) {
                self.cache
                    .invalidate_all(["statements", "transactions", "analytics"]);
                self.finish(Some(badge), self.outcome_notification(&statement));
                return;
            }

            if !followed_up
                && self
                    .action
                    .is_some_and(|a| a.needs_categorize_followup(&statement))
            {
                followed_up = true;
                if let Err(e) = self
                    .client
                    .start_processing(id, ProcessingAction::Categorize)
                    .await
                {
                    self.cache.invalidate("statements");
                    self.finish(
                        Some(badge),
                        Notification::from_error("Categorization could not start", &e),
                    );
                    return;
                }
            }
        }
    }

    fn is_finished(&self, statement: &Statement) -> bool {
        match self.action {
            Some(action) => action.is_finished(statement),
            None => !statement.badge().is_busy(),
        }
    }

    fn outcome_notification(&self, statement: &Statement) -> Notification {
        let badge = statement.badge();
        if badge == StatementBadge::Failed {
            return Notification::error(
                "Processing failed",
                statement
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("{} could not be processed", display_name(statement))),
            );
        }
        match self.action {
            Some(action) => Notification::success(action.success_message(), display_name(statement)),
            None => Notification::info(format!("Statement {badge}"), display_name(statement)),
        }
    }

    fn finish(&self, badge: Option<StatementBadge>, notification: Notification) {
        tracing::info!(statement = %self.statement_id, ?badge, "polling finished");
        {
            let mut active = lock(&self.active);
            if active
                .tasks
                .get(&self.statement_id)
                .is_some_and(|t| t.generation == self.generation)
            {
                active.tasks.remove(&self.statement_id);
            }
        }
        let _ = self.events.send(PollEvent::Finished {
            statement_id: self.statement_id.clone(),
            badge,
            notification,
        });
    }
}

fn display_name(statement: &Statement) -> String {
    if statement.filename.is_empty() {
        format!("Statement {}", statement.id)
    } else {
        statement.filename.clone()
    }
}
