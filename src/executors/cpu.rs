//! `cpu_compute`: count primes below `n` by trial division.

use serde::Deserialize;

use super::decode_params;
use crate::error::ExecutionError;
use crate::task::{Params, TaskResult};

const KIND: &str = "cpu_compute";

#[derive(Debug, Deserialize)]
struct CpuComputeParams {
    #[serde(default = "default_n")]
    n: i64,
}

fn default_n() -> i64 {
    1000
}

/// Run a `cpu_compute` task. Rejects `n` above `max_n`.
///
/// The loop is CPU-bound; callers on an async runtime should run it on a
/// blocking thread.
pub fn cpu_compute(params: &Params, max_n: u64) -> Result<TaskResult, ExecutionError> {
    let p: CpuComputeParams = decode_params(KIND, params)?;
    let n = u64::try_from(p.n).unwrap_or(0);
    if n > max_n {
        return Err(ExecutionError::LimitExceeded {
            kind: KIND,
            reason: format!("n = {n} exceeds the limit of {max_n}"),
        });
    }

    tracing::debug!(n, "Counting primes");
    Ok(TaskResult::new()
        .with("type", KIND)
        .with("count", count_primes(n)))
}

/// Number of primes in `[2, n)`.
pub fn count_primes(n: u64) -> u64 {
    (2..n).filter(|&num| is_prime(num)).count() as u64
}

/// Trial division by every `i` in `[2, floor(sqrt(num))]`.
fn is_prime(num: u64) -> bool {
    let mut i = 2u64;
    while i.saturating_mul(i) <= num {
        if num % i == 0 {
            return false;
        }
        i += 1;
    }
    num >= 2
}
