//! Errors raised while supervising a server process.
//!
//! Every failure mode is its own variant so callers can branch on "already
//! running" versus "timed out" versus "binary misconfigured" without parsing
//! messages. I/O errors are wrapped in `Arc` to keep the enum small and
//! `Send + Sync`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempredis_config::WireEncodeError;
use thiserror::Error;

use crate::signal::StopSignal;

/// Errors surfaced by [`Server`](crate::Server) operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `start` was called while a process is attached.
    #[error("server is already running with pid {pid}")]
    AlreadyRunning {
        /// PID of the attached process.
        pid: u32,
    },

    /// `start` was called on a handle whose process already stopped.
    #[error("server has already been stopped; construct a new handle to start again")]
    AlreadyStopped,

    /// A termination was requested while no process is attached.
    #[error("server is not running")]
    NotRunning,

    /// The process could not be launched or configured.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// No readiness marker appeared within the startup timeout.
    #[error(
        "timed out after {}ms waiting for the server to start; \
         last line received was: {last_line:?}",
        .timeout.as_millis()
    )]
    ReadinessTimeout {
        /// Configured startup timeout.
        timeout: Duration,
        /// Last complete line observed on standard output.
        last_line: String,
    },

    /// Standard output closed before any readiness marker appeared.
    #[error("server failed to start up: {last_line:?}")]
    ReadinessStreamEnded {
        /// Last complete line observed on standard output.
        last_line: String,
        /// Read error that ended the stream, if it did not end cleanly.
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// A port or socket path could not be reserved.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Signal delivery or the wait for exit failed.
    #[error("failed to {signal} server pid {pid}: {source}")]
    Termination {
        /// PID of the process being stopped.
        pid: u32,
        /// Signal that was being delivered.
        signal: StopSignal,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Failures while spawning the server or feeding it configuration.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The server executable does not exist.
    #[error("server binary not found: {binary}")]
    BinaryNotFound {
        /// Executable that was looked up.
        binary: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The operating system refused to start the process.
    #[error("failed to spawn server binary {binary}: {source}")]
    Spawn {
        /// Executable that was launched.
        binary: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The configuration cannot be sent over standard input.
    #[error("configuration cannot be sent to the server: {0}")]
    InvalidConfig(#[from] WireEncodeError),

    /// A standard stream was not captured as a pipe.
    #[error("failed to capture server {stream}")]
    MissingPipe {
        /// Name of the missing stream.
        stream: &'static str,
    },

    /// A thread reading the server's output could not be started.
    #[error("failed to start the server {stream} reader: {source}")]
    OutputReader {
        /// Name of the stream the thread would read.
        stream: &'static str,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Writing the configuration to standard input failed.
    #[error("failed to write configuration to server stdin: {source}")]
    ConfigWrite {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Failures while reserving an address for the server.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Probing for an ephemeral TCP port failed.
    #[error("failed to reserve an ephemeral port on {bind}: {source}")]
    EphemeralPort {
        /// Interface the probe listener was bound to.
        bind: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The private socket directory could not be created.
    #[error("failed to create socket directory: {source}")]
    SocketDirectory {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The temporary directory path is not valid UTF-8.
    #[error("socket directory {path:?} is not valid UTF-8")]
    NonUtf8Path {
        /// Offending directory.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests;
