//! Listening address derived from a configuration.
//!
//! Serialises with a `transport` tag, e.g.
//! `{"transport":"tcp","host":"127.0.0.1","port":"6379"}`.

use std::fmt;

use camino::Utf8PathBuf;
use serde::Serialize;

/// Where a configured server accepts connections.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum Endpoint {
    /// Unix domain socket endpoint.
    Unix {
        /// Socket path exactly as configured.
        path: Utf8PathBuf,
    },
    /// TCP endpoint.
    Tcp {
        /// Interface the server binds to.
        host: String,
        /// Port as configured; kept textual because directives are opaque.
        port: String,
    },
}

impl Endpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self::Tcp {
            host: host.into(),
            port: port.into(),
        }
    }

    /// The string a client dials: `host:port` or the socket path.
    #[must_use]
    pub fn dial_target(&self) -> String {
        match self {
            Self::Unix { path } => path.to_string(),
            Self::Tcp { host, port } => format!("{host}:{port}"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}
