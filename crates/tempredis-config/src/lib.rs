//! Configuration model shared by the `tempredis` supervisor and its CLI.
//!
//! A [`ServerConfig`] is a flat map of directive names to values that is fed
//! verbatim to the supervised server over its standard input. The crate does
//! not understand the server's configuration language; it only knows the
//! handful of directives needed to work out where the server will listen
//! (`bind`, `port`, `unixsocket`) and how to authenticate (`requirepass`).
//!
//! ```rust
//! use tempredis_config::ServerConfig;
//!
//! let config = ServerConfig::new()
//!     .with("port", "11001")
//!     .with("requirepass", "letmein");
//!
//! assert_eq!(config.host(), "127.0.0.1:11001");
//! assert_eq!(config.url(), "redis://:letmein@127.0.0.1:11001");
//! ```

mod config;
mod defaults;
mod endpoint;
mod logging;
mod wire;

pub use config::{BIND_KEY, PASSWORD_KEY, PORT_KEY, SOCKET_KEY, ServerConfig};
pub use defaults::{
    DEFAULT_BIND, DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_SERVER_BINARY, SERVER_BINARY_ENV,
    URL_SCHEME, default_log_format,
};
pub use endpoint::Endpoint;
pub use logging::{LogFormat, LogFormatParseError};
pub use wire::{EMPTY_VALUE_TOKEN, WireEncodeError, WireParseError, parse_wire};
