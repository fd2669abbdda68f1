//! Coordinator client — the worker's only view of the central server.
//!
//! `Coordinator` is the seam the worker loop and reporter talk through;
//! `HttpCoordinator` is the production implementation over reqwest.

mod http;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;

pub use http::HttpCoordinator;
pub use types::*;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::CoordinatorError;
use crate::task::{Task, TaskResult};

/// Identity issued by the coordinator at registration.
///
/// Created once and never mutated; the worker loop owns it and lends it out.
#[derive(Debug)]
pub struct WorkerIdentity {
    pub device_token: SecretString,
    pub user_id: String,
}

impl WorkerIdentity {
    pub fn new(device_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            device_token: SecretString::from(device_token.into()),
            user_id: user_id.into(),
        }
    }

    /// First 8 characters of the token, for log lines.
    pub fn token_prefix(&self) -> String {
        self.device_token.expose_secret().chars().take(8).collect()
    }
}

/// Request/response contract with the coordinator.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Register this device and obtain an identity.
    async fn register(&self, name: &str, email: &str) -> Result<WorkerIdentity, CoordinatorError>;

    /// Fetch the next assignment, if any.
    async fn next_task(&self, identity: &WorkerIdentity) -> Result<Option<Task>, CoordinatorError>;

    /// Submit a task's result. `Ok` means the coordinator acknowledged it.
    async fn submit(
        &self,
        identity: &WorkerIdentity,
        task_id: &str,
        result: &TaskResult,
    ) -> Result<(), CoordinatorError>;

    /// Current point total for the identity's user.
    async fn points(&self, identity: &WorkerIdentity) -> Result<f64, CoordinatorError>;

    /// Liveness check. Defaults to healthy for coordinators without one.
    async fn health(&self) -> Result<(), CoordinatorError> {
        Ok(())
    }
}
