//! Shared configuration for the `customsh` daemon and client.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file (`--config-path` or `CUSTOMSH_CONFIG_PATH`),
//! then `CUSTOMSH_*` environment variables, then command-line flags.
//!
//! ```toml
//! listeners = ["unix:@custom_sh", "unix:@custom_sh?netns=isolated"]
//! workers = 10
//! log_format = "compact"
//! ```

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

mod defaults;
mod socket;

pub use defaults::{
    DEFAULT_LOCK_RETRY_LIMIT, DEFAULT_LOG_FILTER, DEFAULT_MAX_REQUEST_BYTES,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REPLY_TIMEOUT_MS, DEFAULT_SOCKET_NAME, DEFAULT_WORKERS,
    default_listener, default_log_filter, default_log_filter_string, default_log_format,
};
pub use socket::{ListenerEndpoint, SocketParseError, SocketPreparationError, UnixAddress};

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CUSTOMSH")]
pub struct Config {
    /// Sockets to listen on. Empty means the single default abstract socket.
    #[serde(default)]
    pub listeners: Vec<ListenerEndpoint>,
    /// Number of worker threads executing handlers.
    #[ortho_config(default = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Upper bound, in milliseconds, on one readiness wait.
    #[ortho_config(default = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    /// Largest command text accepted in a single request frame.
    #[ortho_config(default = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: u32,
    /// Write timeout, in milliseconds, while a reply is sent.
    #[ortho_config(default = DEFAULT_REPLY_TIMEOUT_MS)]
    pub reply_timeout_ms: u64,
    /// Lock-contention retries allowed per request (zero is unbounded).
    #[ortho_config(default = DEFAULT_LOCK_RETRY_LIMIT)]
    pub lock_retry_limit: u32,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            workers: DEFAULT_WORKERS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            lock_retry_limit: DEFAULT_LOCK_RETRY_LIMIT,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Listeners to bind, falling back to the default abstract socket.
    #[must_use]
    pub fn listener_endpoints(&self) -> Vec<ListenerEndpoint> {
        if self.listeners.is_empty() {
            vec![default_listener()]
        } else {
            self.listeners.clone()
        }
    }

    /// Readiness wait bound.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reply write timeout.
    #[must_use]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Retry bound for contended guarded modules, `None` when unbounded.
    #[must_use]
    pub const fn lock_retry_limit(&self) -> Option<u32> {
        match self.lock_retry_limit {
            0 => None,
            limit => Some(limit),
        }
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Rejects values the daemon cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::ZeroRequestLimit);
        }
        Ok(())
    }
}

/// Configuration values rejected by [`Config::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one worker is required to answer requests.
    #[error("workers must be at least 1")]
    ZeroWorkers,
    /// A zero poll interval would spin the event loop.
    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
    /// A zero request limit would reject every frame.
    #[error("max_request_bytes must be greater than zero")]
    ZeroRequestLimit,
}
