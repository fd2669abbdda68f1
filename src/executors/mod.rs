//! Pure task executors.
//!
//! Each executor takes the payload's raw `params`, decodes the fields it
//! cares about (missing fields take their defaults; mistyped fields, or
//! params that are not an object at all, are an error) and returns a [`TaskResult`](crate::task::TaskResult).

pub mod cpu;
pub mod data;

pub use cpu::{count_primes, cpu_compute};
pub use data::data_process;

use serde::de::DeserializeOwned;

use crate::error::ExecutionError;
use crate::task::Params;

/// Decode a payload's params into a typed struct.
pub(crate) fn decode_params<T: DeserializeOwned>(
    kind: &'static str,
    params: &Params,
) -> Result<T, ExecutionError> {
    serde_json::from_value(params.clone()).map_err(|e| {
        ExecutionError::InvalidParams {
            kind,
            reason: e.to_string(),
        }
    })
}
