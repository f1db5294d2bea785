//! Supervision state of a [`Server`](crate::Server) handle.

use std::process::Child;

/// Where a handle is in its one-way lifecycle.
#[derive(Debug, Default)]
pub(crate) enum ServerState {
    /// No process has been launched yet.
    #[default]
    NotStarted,
    /// A process is attached.
    Running {
        /// The child process handle.
        child: Child,
        /// PID captured at spawn time.
        pid: u32,
    },
    /// The process was stopped or failed to start; the handle is spent.
    Stopped,
}

impl ServerState {
    pub(crate) const fn pid(&self) -> Option<u32> {
        match self {
            Self::Running { pid, .. } => Some(*pid),
            Self::NotStarted | Self::Stopped => None,
        }
    }
}
