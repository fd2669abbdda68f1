//! Submits results and refreshes the point total afterwards.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coordinator::{Coordinator, WorkerIdentity};
use crate::error::CoordinatorError;
use crate::task::TaskResult;

/// Sends finished results to the coordinator.
pub struct Reporter {
    coordinator: Arc<dyn Coordinator>,
}

impl Reporter {
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Submit one result. On acknowledgement, refresh the point total.
    ///
    /// A failed submission is not retried; the coordinator is expected to
    /// reassign the task.
    pub async fn report(
        &self,
        identity: &WorkerIdentity,
        task_id: &str,
        result: &TaskResult,
    ) -> Result<(), CoordinatorError> {
        if let Err(e) = self.coordinator.submit(identity, task_id, result).await {
            warn!(task_id, error = %e, "Result submission failed, task dropped");
            return Err(e);
        }
        info!(task_id, "Result submitted");

        self.refresh_points(identity).await;
        Ok(())
    }

    /// Best-effort point lookup. `None` when the coordinator could not answer;
    /// callers are free to ignore the value.
    pub async fn refresh_points(&self, identity: &WorkerIdentity) -> Option<f64> {
        match self.coordinator.points(identity).await {
            Ok(points) => {
                info!(points, "Current points");
                Some(points)
            }
            Err(e) => {
                debug!(error = %e, "Points refresh failed");
                None
            }
        }
    }
}
