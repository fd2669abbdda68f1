//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Worker configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Coordinator base URL, without a trailing slash.
    pub server_url: String,
    /// Display name sent at registration.
    pub device_name: String,
    /// Fixed delay between polls.
    pub poll_interval: Duration,
    /// Bound on the `tasks/next` request.
    pub poll_timeout: Duration,
    /// Bound on every other coordinator request.
    pub request_timeout: Duration,
    /// Script sandbox settings.
    pub sandbox: SandboxConfig,
    /// Largest `n` accepted by `cpu_compute`.
    pub max_prime_limit: u64,
}

/// Settings for the script sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter binary, invoked as `<runtime> -c <script>`.
    pub runtime: String,
    /// Ceiling applied to a task's requested timeout.
    pub max_timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "python3".to_string(),
            max_timeout: Duration::from_secs(300),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            device_name: default_device_name(),
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            sandbox: SandboxConfig::default(),
            max_prime_limit: 50_000_000,
        }
    }
}

impl WorkerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> crate::error::Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server_url = lookup("SERVER_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.server_url);

        let device_name = lookup("DEVICE_NAME")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.device_name);

        let poll_interval = parse_secs(&lookup, "POLL_INTERVAL_SECS")?
            .unwrap_or(defaults.poll_interval);
        let poll_timeout =
            parse_secs(&lookup, "POLL_TIMEOUT_SECS")?.unwrap_or(defaults.poll_timeout);
        let request_timeout =
            parse_secs(&lookup, "REQUEST_TIMEOUT_SECS")?.unwrap_or(defaults.request_timeout);

        let runtime = lookup("SCRIPT_RUNTIME")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.sandbox.runtime);
        let max_timeout = parse_secs(&lookup, "MAX_SCRIPT_TIMEOUT_SECS")?
            .unwrap_or(defaults.sandbox.max_timeout);

        let max_prime_limit =
            parse_u64(&lookup, "MAX_PRIME_LIMIT")?.unwrap_or(defaults.max_prime_limit);

        Ok(Self {
            server_url,
            device_name,
            poll_interval,
            poll_timeout,
            request_timeout,
            sandbox: SandboxConfig {
                runtime,
                max_timeout,
            },
            max_prime_limit,
        })
    }
}

/// `worker-` followed by the first 8 hex digits of a fresh UUID.
fn default_device_name() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("worker-{}", &hex[..8])
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}

/// Whole seconds; zero is rejected since every duration here must be positive.
fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_u64(lookup, key)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1 second".to_string(),
        }),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}
