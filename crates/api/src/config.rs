use std::time::Duration;

use wattsched_core::scheduling::{JOB_POLL_INTERVAL, PRICE_POLL_INTERVAL};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Grace period for background tasks after the listener closes.
    pub shutdown_timeout_secs: u64,
    pub prediction_service_url: String,
    pub price_service_url: String,
    pub executor_url: String,
    /// Bound on prediction and price calls.
    pub upstream_timeout_secs: u64,
    /// Bound on a single job execution.
    pub execution_timeout_secs: u64,
    pub job_poll_interval_secs: u64,
    pub price_poll_interval_secs: u64,
    /// PostgreSQL URL. Jobs are kept in memory when unset.
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `10`                       |
    /// | `PREDICTION_SERVICE_URL`   | `http://localhost:5001`    |
    /// | `PRICE_SERVICE_URL`        | `http://localhost:5001`    |
    /// | `EXECUTOR_URL`             | `http://localhost:5002`    |
    /// | `UPSTREAM_TIMEOUT_SECS`    | `10`                       |
    /// | `EXECUTION_TIMEOUT_SECS`   | `300`                      |
    /// | `JOB_POLL_INTERVAL_SECS`   | `30`                       |
    /// | `PRICE_POLL_INTERVAL_SECS` | `300`                      |
    /// | `DATABASE_URL`             | unset (in-memory store)    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: secs_from_env("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: secs_from_env("SHUTDOWN_TIMEOUT_SECS", 10),
            prediction_service_url: url_from_env(
                "PREDICTION_SERVICE_URL",
                "http://localhost:5001",
            ),
            price_service_url: url_from_env("PRICE_SERVICE_URL", "http://localhost:5001"),
            executor_url: url_from_env("EXECUTOR_URL", "http://localhost:5002"),
            upstream_timeout_secs: secs_from_env("UPSTREAM_TIMEOUT_SECS", 10),
            execution_timeout_secs: secs_from_env("EXECUTION_TIMEOUT_SECS", 300),
            job_poll_interval_secs: secs_from_env(
                "JOB_POLL_INTERVAL_SECS",
                JOB_POLL_INTERVAL.as_secs(),
            ),
            price_poll_interval_secs: secs_from_env(
                "PRICE_POLL_INTERVAL_SECS",
                PRICE_POLL_INTERVAL.as_secs(),
            ),
            database_url,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_secs(self.job_poll_interval_secs)
    }

    pub fn price_poll_interval(&self) -> Duration {
        Duration::from_secs(self.price_poll_interval_secs)
    }
}

fn url_from_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Panics on a non-numeric or zero value so misconfiguration fails at boot.
fn secs_from_env(key: &str, default: u64) -> u64 {
    let secs: u64 = std::env::var(key)
        .map(|raw| {
            raw.parse()
                .unwrap_or_else(|_| panic!("{key} must be a valid u64"))
        })
        .unwrap_or(default);
    assert!(secs > 0, "{key} must be greater than zero");
    secs
}
