//! `data_process`: count, sum and average a numeric sequence.

use serde::Deserialize;
use serde_json::{Number, Value};

use super::decode_params;
use crate::error::ExecutionError;
use crate::task::{Params, TaskResult};

const KIND: &str = "data_process";

#[derive(Debug, Deserialize)]
struct DataProcessParams {
    #[serde(default)]
    data: Vec<Number>,
}

/// Run a `data_process` task.
///
/// Sums stay integral when every element is an integer; otherwise the sum is
/// a float. An empty sequence yields zeros without dividing.
pub fn data_process(params: &Params) -> Result<TaskResult, ExecutionError> {
    let p: DataProcessParams = decode_params(KIND, params)?;
    let total = p.data.len();

    if total == 0 {
        return Ok(TaskResult::new()
            .with("total", 0)
            .with("sum", 0)
            .with("avg", 0));
    }

    let float_sum: f64 = p.data.iter().filter_map(Number::as_f64).sum();
    let sum = integer_sum(&p.data)
        .map(Value::from)
        .unwrap_or_else(|| Value::from(float_sum));
    let avg = float_sum / total as f64;

    Ok(TaskResult::new()
        .with("total", total)
        .with("sum", sum)
        .with("avg", avg))
}

/// Exact sum when all elements are integers and it fits in an `i64`.
fn integer_sum(data: &[Number]) -> Option<i64> {
    data.iter()
        .try_fold(0i64, |acc, n| acc.checked_add(n.as_i64()?))
}
