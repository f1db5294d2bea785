//! Waiting for the operator to ask for shutdown.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use crate::CLI_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal {
    /// Blocks until shutdown should proceed.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the notification mechanism fails.
    fn wait(&mut self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener waiting for `SIGINT`, `SIGTERM`, `SIGQUIT` or `SIGHUP`.
pub struct SystemShutdownSignal {
    signals: Signals,
}

impl SystemShutdownSignal {
    /// Installs the handlers immediately so no signal is missed between
    /// startup and [`ShutdownSignal::wait`].
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when registration fails.
    pub fn install() -> Result<Self, ShutdownError> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(Self { signals })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&mut self) -> Result<(), ShutdownError> {
        if let Some(signal) = self.signals.forever().next() {
            info!(target: CLI_TARGET, signal, "shutdown signal received");
        }
        Ok(())
    }
}
