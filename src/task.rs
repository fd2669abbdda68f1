//! Task types received from the coordinator.
//!
//! The coordinator tags every payload with a string `type`. It is decoded once,
//! at the wire boundary, into [`TaskPayload`]; everything downstream matches on
//! the enum instead of the string. Decoding a payload never fails: whatever
//! `type` and `params` hold, the task still reaches the dispatcher and gets a
//! result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters attached to a payload, as received. Normally an object whose
/// shape depends on the task kind; executors reject anything else.
pub type Params = Value;

/// A unit of work assigned by the coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub payload: TaskPayload,
}

/// Typed task payload, one variant per supported kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum TaskPayload {
    CpuCompute(Params),
    DataProcess(Params),
    Script(Params),
    /// A `type` this worker does not know, a non-string `type`, or none at all.
    Unknown { kind: Option<String>, params: Params },
}

impl Default for TaskPayload {
    fn default() -> Self {
        Self::Unknown {
            kind: None,
            params: empty_params(),
        }
    }
}

impl TaskPayload {
    /// The wire name of this payload's kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::CpuCompute(_) => "cpu_compute",
            Self::DataProcess(_) => "data_process",
            Self::Script(_) => "script",
            Self::Unknown { kind, .. } => kind.as_deref().unwrap_or("<missing>"),
        }
    }
}

fn empty_params() -> Params {
    Value::Object(Map::new())
}

impl From<Value> for TaskPayload {
    fn from(raw: Value) -> Self {
        let Value::Object(mut fields) = raw else {
            return Self::default();
        };

        // Missing or null params default to an empty object; any other
        // shape is kept as-is for the executor to reject.
        let params = match fields.remove("params") {
            None | Some(Value::Null) => empty_params(),
            Some(params) => params,
        };

        match fields.remove("type") {
            Some(Value::String(kind)) => match kind.as_str() {
                "cpu_compute" => Self::CpuCompute(params),
                "data_process" => Self::DataProcess(params),
                "script" => Self::Script(params),
                _ => Self::Unknown {
                    kind: Some(kind),
                    params,
                },
            },
            None | Some(Value::Null) => Self::Unknown { kind: None, params },
            Some(other) => Self::Unknown {
                kind: Some(other.to_string()),
                params,
            },
        }
    }
}

/// Outcome of one task, submitted verbatim as the `result` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskResult(Map<String, Value>);

impl TaskResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result carrying only an `error` message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new().with("error", message.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `error` message, if this result reports one.
    pub fn error_message(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
