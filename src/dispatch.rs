//! Routes a task to its executor and normalizes the outcome into a result.

use tracing::{error, info};

use crate::config::WorkerConfig;
use crate::error::ExecutionError;
use crate::executors;
use crate::sandbox::ScriptRunner;
use crate::task::{Task, TaskPayload, TaskResult};

/// Result message for a payload whose `type` this worker does not support.
pub const UNKNOWN_TYPE_MESSAGE: &str = "unknown task type";

/// Maps a task to exactly one executor invocation.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    scripts: ScriptRunner,
    max_prime_limit: u64,
}

impl Dispatcher {
    pub fn new(scripts: ScriptRunner, max_prime_limit: u64) -> Self {
        Self {
            scripts,
            max_prime_limit,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(ScriptRunner::new(&config.sandbox), config.max_prime_limit)
    }

    /// Execute a task and return the result to submit.
    ///
    /// Never fails: an unknown type and an executor failure both become a
    /// result carrying an `error` field, so every task gets exactly one
    /// submission.
    pub async fn dispatch(&self, task: &Task) -> TaskResult {
        info!(task_id = %task.id, kind = task.payload.kind(), "Executing task");

        match self.execute(&task.payload).await {
            Ok(result) => result,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "Task execution failed");
                TaskResult::error(format!("execution failed: {e}"))
            }
        }
    }

    async fn execute(&self, payload: &TaskPayload) -> Result<TaskResult, ExecutionError> {
        match payload {
            TaskPayload::CpuCompute(params) => {
                let params = params.clone();
                let max_n = self.max_prime_limit;
                tokio::task::spawn_blocking(move || executors::cpu_compute(&params, max_n))
                    .await
                    .map_err(|e| ExecutionError::Panicked(e.to_string()))?
            }
            TaskPayload::DataProcess(params) => executors::data_process(params),
            TaskPayload::Script(params) => self.scripts.run_task(params).await,
            TaskPayload::Unknown { kind, .. } => {
                tracing::warn!(kind = ?kind, "Unknown task type");
                Ok(TaskResult::error(UNKNOWN_TYPE_MESSAGE))
            }
        }
    }
}
