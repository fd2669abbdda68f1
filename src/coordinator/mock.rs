//! Scripted in-memory coordinator for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Coordinator, WorkerIdentity};
use crate::error::CoordinatorError;
use crate::task::{Task, TaskResult};

pub(crate) type PollReply = Result<Option<Task>, CoordinatorError>;

#[derive(Default)]
struct State {
    polls: VecDeque<PollReply>,
    poll_count: usize,
    submissions: Vec<(String, TaskResult)>,
    points_calls: usize,
}

/// Replays queued poll replies; once empty, reports no work.
#[derive(Default)]
pub(crate) struct MockCoordinator {
    state: Mutex<State>,
    fail_submit: bool,
    fail_points: bool,
    fail_register: bool,
}

impl MockCoordinator {
    pub fn with_polls(polls: impl IntoIterator<Item = PollReply>) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().polls = polls.into_iter().collect();
        mock
    }

    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    pub fn failing_points(mut self) -> Self {
        self.fail_points = true;
        self
    }

    pub fn failing_register(mut self) -> Self {
        self.fail_register = true;
        self
    }

    pub fn poll_count(&self) -> usize {
        self.state.lock().unwrap().poll_count
    }

    pub fn submissions(&self) -> Vec<(String, TaskResult)> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn points_calls(&self) -> usize {
        self.state.lock().unwrap().points_calls
    }
}

pub(crate) fn transport_error() -> CoordinatorError {
    CoordinatorError::Request {
        endpoint: "/api/tasks/next".to_string(),
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    async fn register(&self, _name: &str, _email: &str) -> Result<WorkerIdentity, CoordinatorError> {
        if self.fail_register {
            return Err(CoordinatorError::Status {
                endpoint: "/api/register".to_string(),
                status: 400,
                body: "duplicate".to_string(),
            });
        }
        Ok(WorkerIdentity::new("mock-token-0001", "mock-user"))
    }

    async fn next_task(&self, _identity: &WorkerIdentity) -> Result<Option<Task>, CoordinatorError> {
        let mut state = self.state.lock().unwrap();
        state.poll_count += 1;
        state.polls.pop_front().unwrap_or(Ok(None))
    }

    async fn submit(
        &self,
        _identity: &WorkerIdentity,
        task_id: &str,
        result: &TaskResult,
    ) -> Result<(), CoordinatorError> {
        self.state
            .lock()
            .unwrap()
            .submissions
            .push((task_id.to_string(), result.clone()));
        if self.fail_submit {
            return Err(CoordinatorError::Status {
                endpoint: "/api/tasks/submit".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    async fn points(&self, _identity: &WorkerIdentity) -> Result<f64, CoordinatorError> {
        self.state.lock().unwrap().points_calls += 1;
        if self.fail_points {
            return Err(transport_error());
        }
        Ok(10.0)
    }
}
