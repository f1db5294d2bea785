//! Per-handle supervision settings.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempredis_config::{DEFAULT_SERVER_BINARY, SERVER_BINARY_ENV};

use crate::readiness::ReadinessMarker;

/// Startup timeout applied when none is configured.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(1);

/// How the server is reached when the configuration does not say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transport {
    /// Allocate an ephemeral TCP port when `port` is absent.
    #[default]
    Tcp,
    /// Create a private socket directory when `unixsocket` is absent and
    /// disable the TCP listener unless `port` is pinned.
    UnixSocket,
}

/// Settings controlling how a [`Server`](crate::Server) launches and waits.
///
/// Markers and timeouts live here rather than in globals so concurrently
/// supervised servers can use different values.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    binary: PathBuf,
    startup_timeout: Duration,
    markers: Vec<ReadinessMarker>,
    transport: Transport,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            binary: resolve_server_binary(None),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            markers: vec![ReadinessMarker::Ready],
            transport: Transport::default(),
        }
    }
}

impl ServerOptions {
    /// Creates options with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `binary` as the server executable.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Bounds how long `start` waits for a readiness marker.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Replaces the markers that count as "ready". Any one match suffices.
    ///
    /// An empty list falls back to [`ReadinessMarker::Ready`].
    #[must_use]
    pub fn with_markers(mut self, markers: impl IntoIterator<Item = ReadinessMarker>) -> Self {
        self.markers.clear();
        for marker in markers {
            if !self.markers.contains(&marker) {
                self.markers.push(marker);
            }
        }
        if self.markers.is_empty() {
            self.markers.push(ReadinessMarker::Ready);
        }
        self
    }

    /// Chooses how an unpinned server address is allocated.
    #[must_use]
    pub const fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Server executable.
    #[must_use]
    pub fn binary(&self) -> &Path {
        self.binary.as_path()
    }

    /// Readiness timeout.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    /// Markers that satisfy the readiness wait.
    #[must_use]
    pub fn markers(&self) -> &[ReadinessMarker] {
        &self.markers
    }

    /// Address allocation strategy.
    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.transport
    }
}

/// Picks the server executable: the override, then [`SERVER_BINARY_ENV`],
/// then [`DEFAULT_SERVER_BINARY`].
#[must_use]
pub fn resolve_server_binary(binary_override: Option<&Path>) -> PathBuf {
    binary_override
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(SERVER_BINARY_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_BINARY))
}
