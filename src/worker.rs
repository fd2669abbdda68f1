//! The worker loop: poll → dispatch → report, forever.
//!
//! One task is in flight at a time. Nothing a single iteration does can end
//! the loop: poll failures, failed submissions and even panics inside an
//! executor are logged and the loop carries on after the usual delay. Only
//! the shutdown future stops it.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::coordinator::{Coordinator, WorkerIdentity};
use crate::dispatch::Dispatcher;
use crate::error::{CoordinatorError, Result};
use crate::reporter::Reporter;
use crate::task::Task;

/// What a single poll produced.
#[derive(Debug)]
pub enum PollOutcome {
    Task(Task),
    Idle,
    Failed(CoordinatorError),
}

/// Counters for one `run_until` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub polls: u64,
    pub poll_failures: u64,
    pub idle_polls: u64,
    /// Tasks whose result the coordinator acknowledged.
    pub tasks_handled: u64,
    /// Tasks whose result never reached the coordinator.
    pub tasks_dropped: u64,
}

/// A registered worker.
pub struct WorkerLoop {
    identity: WorkerIdentity,
    coordinator: Arc<dyn Coordinator>,
    dispatcher: Dispatcher,
    reporter: Reporter,
    poll_interval: Duration,
}

impl WorkerLoop {
    pub fn new(
        identity: WorkerIdentity,
        coordinator: Arc<dyn Coordinator>,
        dispatcher: Dispatcher,
        poll_interval: Duration,
    ) -> Self {
        let reporter = Reporter::new(Arc::clone(&coordinator));
        Self {
            identity,
            coordinator,
            dispatcher,
            reporter,
            poll_interval,
        }
    }

    /// Register with the coordinator and build a loop around the issued identity.
    ///
    /// The only fallible step of a worker's life: without an identity there
    /// is nothing to poll with.
    pub async fn register(
        coordinator: Arc<dyn Coordinator>,
        device_name: &str,
        dispatcher: Dispatcher,
        poll_interval: Duration,
    ) -> Result<Self> {
        let email = format!("{device_name}-{}@worker.local", Uuid::new_v4());
        let identity = coordinator.register(device_name, &email).await?;
        info!(
            device = device_name,
            token = %format!("{}...", identity.token_prefix()),
            "Device registered"
        );
        Ok(Self::new(identity, coordinator, dispatcher, poll_interval))
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Ask the coordinator for work.
    pub async fn poll(&self) -> PollOutcome {
        match self.coordinator.next_task(&self.identity).await {
            Ok(Some(task)) => PollOutcome::Task(task),
            Ok(None) => PollOutcome::Idle,
            Err(e) => PollOutcome::Failed(e),
        }
    }

    /// Execute a task and submit its result. Returns whether the coordinator
    /// acknowledged the submission.
    pub async fn process(&self, task: &Task) -> bool {
        let result = self.dispatcher.dispatch(task).await;
        self.reporter
            .report(&self.identity, &task.id, &result)
            .await
            .is_ok()
    }

    /// One poll and, if work arrived, its processing.
    pub async fn tick(&self, stats: &mut LoopStats) {
        stats.polls += 1;
        match self.poll().await {
            PollOutcome::Task(task) => {
                let handled = AssertUnwindSafe(self.process(&task)).catch_unwind().await;
                match handled {
                    Ok(true) => stats.tasks_handled += 1,
                    Ok(false) => stats.tasks_dropped += 1,
                    Err(_) => {
                        error!(task_id = %task.id, "Task processing panicked, task dropped");
                        stats.tasks_dropped += 1;
                    }
                }
            }
            PollOutcome::Idle => {
                stats.idle_polls += 1;
                info!(
                    "No task available, retrying in {}s",
                    self.poll_interval.as_secs_f64()
                );
            }
            PollOutcome::Failed(e) => {
                stats.poll_failures += 1;
                warn!(error = %e, "Failed to fetch task");
            }
        }
    }

    /// Run until `shutdown` resolves. Shutdown is observed between iterations
    /// and during the inter-poll delay; an in-flight task always finishes.
    pub async fn run_until<F>(&self, shutdown: F) -> LoopStats
    where
        F: Future<Output = ()>,
    {
        let mut stats = LoopStats::default();
        tokio::pin!(shutdown);

        loop {
            self.tick(&mut stats).await;

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(
            polls = stats.polls,
            handled = stats.tasks_handled,
            dropped = stats.tasks_dropped,
            poll_failures = stats.poll_failures,
            "Worker stopped"
        );
        stats
    }
}
