//! reqwest-backed coordinator client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use super::types::{
    HealthResponse, NextTaskResponse, PointsResponse, RegisterRequest, RegisterResponse,
    SubmitRequest,
};
use super::{Coordinator, WorkerIdentity};
use crate::config::WorkerConfig;
use crate::error::CoordinatorError;
use crate::task::{Task, TaskResult};

/// Maximum number of body characters kept in a status error.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Coordinator client speaking the JSON-over-HTTP API.
pub struct HttpCoordinator {
    base_url: String,
    client: reqwest::Client,
    poll_timeout: Duration,
    request_timeout: Duration,
}

impl HttpCoordinator {
    pub fn new(base_url: impl Into<String>, poll_timeout: Duration, request_timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            poll_timeout,
            request_timeout,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.server_url.clone(),
            config.poll_timeout,
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Reject non-2xx responses, keeping a trimmed copy of the body.
    async fn check_status(
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, CoordinatorError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(CoordinatorError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }

    async fn read_json<T: DeserializeOwned>(
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<T, CoordinatorError> {
        let resp = Self::check_status(endpoint, resp).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| request_error(endpoint, e))?;
        serde_json::from_slice(&bytes).map_err(|e| CoordinatorError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

fn request_error(endpoint: &str, e: reqwest::Error) -> CoordinatorError {
    let reason = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    CoordinatorError::Request {
        endpoint: endpoint.to_string(),
        reason,
    }
}

#[async_trait]
impl Coordinator for HttpCoordinator {
    async fn register(&self, name: &str, email: &str) -> Result<WorkerIdentity, CoordinatorError> {
        const ENDPOINT: &str = "/api/register";
        let resp = self
            .client
            .post(self.url(ENDPOINT))
            .timeout(self.request_timeout)
            .json(&RegisterRequest { name, email })
            .send()
            .await
            .map_err(|e| request_error(ENDPOINT, e))?;

        let body: RegisterResponse = Self::read_json(ENDPOINT, resp).await?;
        Ok(WorkerIdentity::new(body.device_token, body.user_id))
    }

    async fn next_task(&self, identity: &WorkerIdentity) -> Result<Option<Task>, CoordinatorError> {
        const ENDPOINT: &str = "/api/tasks/next";
        let resp = self
            .client
            .get(self.url(ENDPOINT))
            .timeout(self.poll_timeout)
            .query(&[("device_token", identity.device_token.expose_secret())])
            .send()
            .await
            .map_err(|e| request_error(ENDPOINT, e))?;

        let body: NextTaskResponse = Self::read_json(ENDPOINT, resp).await?;
        Ok(body.task)
    }

    async fn submit(
        &self,
        identity: &WorkerIdentity,
        task_id: &str,
        result: &TaskResult,
    ) -> Result<(), CoordinatorError> {
        const ENDPOINT: &str = "/api/tasks/submit";
        let resp = self
            .client
            .post(self.url(ENDPOINT))
            .timeout(self.request_timeout)
            .json(&SubmitRequest {
                task_id,
                device_token: identity.device_token.expose_secret(),
                result,
            })
            .send()
            .await
            .map_err(|e| request_error(ENDPOINT, e))?;

        Self::check_status(ENDPOINT, resp).await?;
        Ok(())
    }

    async fn points(&self, identity: &WorkerIdentity) -> Result<f64, CoordinatorError> {
        let endpoint = format!("/api/users/{}/points", identity.user_id);
        let resp = self
            .client
            .get(self.url(&endpoint))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| request_error(&endpoint, e))?;

        let body: PointsResponse = Self::read_json(&endpoint, resp).await?;
        Ok(body.total_points.unwrap_or(0.0))
    }

    async fn health(&self) -> Result<(), CoordinatorError> {
        const ENDPOINT: &str = "/health";
        let resp = self
            .client
            .get(self.url(ENDPOINT))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| request_error(ENDPOINT, e))?;

        let body: HealthResponse = Self::read_json(ENDPOINT, resp).await?;
        if body.status != "ok" {
            return Err(CoordinatorError::InvalidResponse {
                endpoint: ENDPOINT.to_string(),
                reason: format!("status {:?}", body.status),
            });
        }
        Ok(())
    }
}
