use crate::LogFormat;
use crate::socket::{ListenerEndpoint, UnixAddress};

/// Abstract socket name the daemon listens on when no listener is configured.
pub const DEFAULT_SOCKET_NAME: &str = "custom_sh";

/// Number of worker threads executing handlers.
pub const DEFAULT_WORKERS: usize = 10;

/// Upper bound on one readiness wait, which is also the shutdown latency.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Largest command text accepted in one request frame.
pub const DEFAULT_MAX_REQUEST_BYTES: u32 = 1024 * 1024;

/// Write timeout applied to a connection while its reply is sent.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5_000;

/// Lock-contention retries allowed per request; zero means unbounded.
pub const DEFAULT_LOCK_RETRY_LIMIT: u32 = 0;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Listener used when the configuration names none.
#[must_use]
pub fn default_listener() -> ListenerEndpoint {
    ListenerEndpoint::new(UnixAddress::Abstract(DEFAULT_SOCKET_NAME.to_owned()))
}
