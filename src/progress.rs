//! Progress tracking keyed by task identifier
//!
//! [`ProgressTracker`] is an explicit store handed to the pipeline at
//! construction. The pipeline writes stage transitions; the API reads them on a
//! separate path. Every write is also broadcast as a [`ProgressEvent`].
//!
//! Entries are evicted so the map does not grow for the life of the process:
//! finished tasks after `retention`, unfinished ones after `idle_ttl` without
//! an update.

use crate::config::ProgressConfig;
use crate::error::{Error, Result};
use crate::types::{ProgressEvent, ProgressSnapshot, Stage, TaskId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
struct TaskEntry {
    stage: Stage,
    detail: Option<String>,
    updated_at: chrono::DateTime<chrono::Utc>,
    touched: Instant,
}

struct Inner {
    tasks: RwLock<HashMap<TaskId, TaskEntry>>,
    events: broadcast::Sender<ProgressEvent>,
    retention: Duration,
    idle_ttl: Duration,
}

/// Concurrency-safe task-id → stage store (cloneable, all clones share state)
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

impl ProgressTracker {
    /// Create an empty tracker
    pub fn new(config: &ProgressConfig) -> Self {
        let (events, _rx) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(HashMap::new()),
                events,
                retention: config.retention,
                idle_ttl: config.idle_ttl,
            }),
        }
    }

    /// Register a task in the `initializing` stage
    ///
    /// Registering an identifier that is already present restarts it.
    pub fn register(&self, task_id: &TaskId) {
        self.set(task_id, Stage::Initializing, None);
    }

    /// Record the current stage of a task (overwrites)
    pub fn set(&self, task_id: &TaskId, stage: Stage, detail: Option<String>) {
        let entry = TaskEntry {
            stage,
            detail: detail.clone(),
            updated_at: chrono::Utc::now(),
            touched: Instant::now(),
        };

        self.inner
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.clone(), entry);

        tracing::debug!(task_id = %task_id, stage = %stage, detail = ?detail, "task stage updated");

        // No subscribers is fine
        self.inner
            .events
            .send(ProgressEvent {
                task_id: task_id.clone(),
                stage,
                detail,
            })
            .ok();
    }

    /// Record that a task failed
    pub fn fail(&self, task_id: &TaskId, detail: impl Into<String>) {
        self.set(task_id, Stage::Error, Some(detail.into()));
    }

    /// Current progress of a task
    ///
    /// # Errors
    ///
    /// [`Error::UnknownTask`] when the identifier was never registered (or has
    /// been evicted).
    pub fn get(&self, task_id: &TaskId) -> Result<ProgressSnapshot> {
        let tasks = self
            .inner
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        tasks
            .get(task_id)
            .map(|entry| ProgressSnapshot {
                task_id: task_id.clone(),
                stage: entry.stage,
                detail: entry.detail.clone(),
                updated_at: entry.updated_at,
            })
            .ok_or_else(|| Error::UnknownTask(task_id.clone()))
    }

    /// Subscribe to stage transitions of all tasks
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.events.subscribe()
    }

    /// Number of tracked tasks
    pub fn len(&self) -> usize {
        self.inner
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no task is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries past their lifetime, returning how many were removed
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub(crate) fn evict_expired_at(&self, now: Instant) -> usize {
        let mut tasks = self
            .inner
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let before = tasks.len();
        tasks.retain(|_, entry| {
            let age = now.saturating_duration_since(entry.touched);
            let ttl = if entry.stage.is_terminal() {
                self.inner.retention
            } else {
                self.inner.idle_ttl
            };
            age < ttl
        });
        before - tasks.len()
    }

    /// Spawn a background task that evicts expired entries every `interval`
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = tracker.evict_expired();
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = tracker.len(), "evicted expired tasks");
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        tracing::debug!("progress sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Register a task and return a guard that owns its outcome
    pub fn guard(&self, task_id: TaskId) -> TaskGuard {
        self.register(&task_id);
        TaskGuard {
            tracker: self.clone(),
            task_id,
            armed: true,
        }
    }
}

/// Detail recorded when a run is abandoned by its consumer
pub const DISCONNECTED: &str = "client disconnected";

/// Owns the final stage of one run
///
/// Exactly one of [`complete`](Self::complete) or [`fail`](Self::fail) settles
/// the task. A guard dropped while still armed means the consumer went away
/// mid-run, and the task is recorded as failed with [`DISCONNECTED`].
#[derive(Debug)]
pub struct TaskGuard {
    tracker: ProgressTracker,
    task_id: TaskId,
    armed: bool,
}

impl TaskGuard {
    /// Task this guard settles
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Record an intermediate stage
    pub fn set(&self, stage: Stage, detail: Option<String>) {
        if self.armed {
            self.tracker.set(&self.task_id, stage, detail);
        }
    }

    /// Settle the task as completed
    pub fn complete(&mut self) {
        if std::mem::replace(&mut self.armed, false) {
            self.tracker.set(&self.task_id, Stage::Completed, None);
        }
    }

    /// Settle the task as failed
    pub fn fail(&mut self, detail: impl Into<String>) {
        if std::mem::replace(&mut self.armed, false) {
            self.tracker.fail(&self.task_id, detail);
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::info!(task_id = %self.task_id, "run abandoned by consumer");
            self.tracker.fail(&self.task_id, DISCONNECTED);
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("tasks", &self.len())
            .finish()
    }
}
