//! Integration tests for the worker against a live HTTP coordinator.
//!
//! Each test spins up an Axum coordinator on a random port and drives the
//! real `HttpCoordinator` and `WorkerLoop` against it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use compute_worker::config::SandboxConfig;
use compute_worker::coordinator::{Coordinator, HttpCoordinator, WorkerIdentity};
use compute_worker::dispatch::Dispatcher;
use compute_worker::error::CoordinatorError;
use compute_worker::sandbox::ScriptRunner;
use compute_worker::worker::{LoopStats, WorkerLoop};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEVICE_TOKEN: &str = "dev-token-1234567890";
const USER_ID: &str = "user-42";

#[derive(Default)]
struct Coord {
    registrations: Vec<Value>,
    tasks: VecDeque<Value>,
    submissions: Vec<Value>,
    points_calls: usize,
    fail_points: bool,
}

type Shared = Arc<Mutex<Coord>>;

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    state.lock().unwrap().registrations.push(body);
    Json(json!({"user_id": USER_ID, "device_token": DEVICE_TOKEN}))
}

async fn next_task(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if query.get("device_token").map(String::as_str) != Some(DEVICE_TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    let task = state.lock().unwrap().tasks.pop_front();
    (StatusCode::OK, Json(json!({"task": task})))
}

async fn submit(State(state): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["device_token"] != DEVICE_TOKEN {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    state.lock().unwrap().submissions.push(body);
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn points(
    State(state): State<Shared>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut coord = state.lock().unwrap();
    coord.points_calls += 1;
    if coord.fail_points || user_id != USER_ID {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "no points"})));
    }
    let total = coord.submissions.len() * 10;
    (StatusCode::OK, Json(json!({"total_points": total})))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Start an Axum coordinator on a random port, return (base_url, state).
async fn start_coordinator(initial: Coord) -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(initial));
    let app = Router::new()
        .route("/api/register", post(register))
        .route("/api/tasks/next", get(next_task))
        .route("/api/tasks/submit", post(submit))
        .route("/api/users/{user_id}/points", get(points))
        .route("/health", get(health))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), state)
}

fn client(base_url: &str) -> Arc<dyn Coordinator> {
    Arc::new(HttpCoordinator::new(
        base_url,
        Duration::from_secs(2),
        Duration::from_secs(2),
    ))
}

fn dispatcher() -> Dispatcher {
    let scripts = ScriptRunner::new(&SandboxConfig {
        runtime: "sh".to_string(),
        max_timeout: Duration::from_secs(5),
    });
    Dispatcher::new(scripts, 100_000)
}

/// Resolves once the coordinator has served `n` points requests.
async fn after_points_calls(state: Shared, n: usize) {
    loop {
        if state.lock().unwrap().points_calls >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn register_poll_execute_submit_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let (url, state) = start_coordinator(Coord {
            tasks: VecDeque::from([json!({
                "id": "t1",
                "payload": {"type": "data_process", "params": {"data": [1, 2, 3, 4]}}
            })]),
            ..Default::default()
        })
        .await;

        let worker = WorkerLoop::register(
            client(&url),
            "test-device",
            dispatcher(),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert_eq!(worker.identity().user_id, USER_ID);

        let stats = worker.run_until(after_points_calls(state.clone(), 1)).await;
        assert_eq!(stats.tasks_handled, 1);

        let coord = state.lock().unwrap();
        assert_eq!(coord.registrations.len(), 1);
        assert_eq!(coord.registrations[0]["name"], "test-device");
        let email = coord.registrations[0]["email"].as_str().unwrap();
        assert!(email.starts_with("test-device-") && email.ends_with("@worker.local"));

        assert_eq!(
            coord.submissions,
            vec![json!({
                "task_id": "t1",
                "device_token": DEVICE_TOKEN,
                "result": {"total": 4, "sum": 10, "avg": 2.5}
            })]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn points_check_failure_is_ignored() {
    timeout(TEST_TIMEOUT, async {
        let (url, state) = start_coordinator(Coord {
            tasks: VecDeque::from([json!({
                "id": "t2",
                "payload": {"type": "cpu_compute", "params": {"n": 10}}
            })]),
            fail_points: true,
            ..Default::default()
        })
        .await;

        let worker = WorkerLoop::new(
            WorkerIdentity::new(DEVICE_TOKEN, USER_ID),
            client(&url),
            dispatcher(),
            Duration::from_millis(20),
        );

        let mut stats = LoopStats::default();
        worker.tick(&mut stats).await;

        assert_eq!(stats.tasks_handled, 1);
        let coord = state.lock().unwrap();
        assert_eq!(coord.points_calls, 1);
        assert_eq!(coord.submissions[0]["result"]["count"], 4);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_and_script_tasks_are_reported() {
    timeout(TEST_TIMEOUT, async {
        let (url, state) = start_coordinator(Coord {
            tasks: VecDeque::from([
                json!({"id": "u1", "payload": {"type": "gpu_render", "params": {}}}),
                json!({"id": "s1", "payload": {"type": "script", "params": {"script": "echo hi"}}}),
                json!({"id": "s2", "payload": {"type": "script", "params": {"script": "sleep 5", "timeout": 0.2}}}),
            ]),
            ..Default::default()
        })
        .await;

        let worker = WorkerLoop::new(
            WorkerIdentity::new(DEVICE_TOKEN, USER_ID),
            client(&url),
            dispatcher(),
            Duration::from_millis(10),
        );

        let mut stats = LoopStats::default();
        for _ in 0..3 {
            worker.tick(&mut stats).await;
        }
        assert_eq!(stats.tasks_handled, 3);

        let coord = state.lock().unwrap();
        assert_eq!(coord.submissions[0]["result"], json!({"error": "unknown task type"}));
        assert_eq!(
            coord.submissions[1]["result"],
            json!({"stdout": "hi\n", "stderr": "", "returncode": 0})
        );
        assert_eq!(
            coord.submissions[2]["result"],
            json!({"error": "script execution timed out"})
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_payload_still_gets_a_result() {
    timeout(TEST_TIMEOUT, async {
        let (url, state) = start_coordinator(Coord {
            tasks: VecDeque::from([
                json!({"id": "m1", "payload": {"type": 42, "params": {}}}),
                json!({"id": "m2", "payload": {"type": "data_process", "params": [1, 2]}}),
            ]),
            ..Default::default()
        })
        .await;

        let worker = WorkerLoop::new(
            WorkerIdentity::new(DEVICE_TOKEN, USER_ID),
            client(&url),
            dispatcher(),
            Duration::from_millis(10),
        );

        let mut stats = LoopStats::default();
        for _ in 0..2 {
            worker.tick(&mut stats).await;
        }
        assert_eq!(stats.poll_failures, 0);
        assert_eq!(stats.tasks_handled, 2);

        let coord = state.lock().unwrap();
        assert_eq!(coord.submissions.len(), 2);
        assert_eq!(coord.submissions[0]["task_id"], json!("m1"));
        assert_eq!(coord.submissions[0]["result"], json!({"error": "unknown task type"}));
        assert_eq!(coord.submissions[1]["task_id"], json!("m2"));
        let message = coord.submissions[1]["result"]["error"].as_str().unwrap();
        assert!(message.starts_with("execution failed"), "{message}");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rejected_poll_is_a_poll_failure() {
    timeout(TEST_TIMEOUT, async {
        let (url, _state) = start_coordinator(Coord::default()).await;
        let coordinator = client(&url);

        let stranger = WorkerIdentity::new("not-a-token", USER_ID);
        let err = coordinator.next_task(&stranger).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Status { status: 401, .. }));

        let worker = WorkerLoop::new(stranger, coordinator, dispatcher(), Duration::from_millis(10));
        let mut stats = LoopStats::default();
        worker.tick(&mut stats).await;
        worker.tick(&mut stats).await;
        assert_eq!(stats.poll_failures, 2);
        assert_eq!(stats.polls, 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn health_and_points_endpoints() {
    timeout(TEST_TIMEOUT, async {
        let (url, _state) = start_coordinator(Coord::default()).await;
        let coordinator = client(&url);

        coordinator.health().await.unwrap();
        let identity = WorkerIdentity::new(DEVICE_TOKEN, USER_ID);
        assert_eq!(coordinator.points(&identity).await.unwrap(), 0.0);
    })
    .await
    .expect("test timed out");
}
