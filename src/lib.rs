//! Compute worker — polls a coordinator for tasks, runs them, reports results.

pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod executors;
pub mod reporter;
pub mod sandbox;
pub mod shutdown;
pub mod task;
pub mod worker;
