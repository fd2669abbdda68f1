//! Wire types for the coordinator HTTP API.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskResult};

/// Body of `POST /api/register`.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

/// Response of `POST /api/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    pub device_token: String,
    pub user_id: String,
}

/// Response of `GET /api/tasks/next`. A missing or `null` task means no work.
#[derive(Debug, Deserialize)]
pub struct NextTaskResponse {
    #[serde(default)]
    pub task: Option<Task>,
}

/// Body of `POST /api/tasks/submit`.
#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    pub task_id: &'a str,
    pub device_token: &'a str,
    pub result: &'a TaskResult,
}

/// Response of `GET /api/users/{user_id}/points`.
#[derive(Debug, Deserialize)]
pub struct PointsResponse {
    #[serde(default)]
    pub total_points: Option<f64>,
}

/// Response of `GET /health`.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
