//! Default values used when a directive is absent from the configuration.

use crate::logging::LogFormat;

/// Interface the server binds to when `bind` is not configured.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Port the server listens on when `port` is not configured.
pub const DEFAULT_PORT: &str = "6379";

/// Scheme used for derived connection URLs.
pub const URL_SCHEME: &str = "redis";

/// Server executable launched when no override is supplied.
pub const DEFAULT_SERVER_BINARY: &str = "redis-server";

/// Environment variable consulted for the server executable.
pub const SERVER_BINARY_ENV: &str = "TEMPREDIS_SERVER_BIN";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
