//! Delivery of termination signals to the supervised child.

use std::fmt;
use std::io;
use std::process::Child;

/// How a running server is asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// `SIGTERM`: the server shuts down cleanly.
    Terminate,
    /// `SIGKILL`: the process is removed without running shutdown code.
    Kill,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => write!(f, "terminate"),
            Self::Kill => write!(f, "kill"),
        }
    }
}

/// Sends `signal` to `child` without waiting for it to exit.
pub(crate) fn deliver(child: &mut Child, signal: StopSignal) -> io::Result<()> {
    match signal {
        StopSignal::Kill => child.kill(),
        StopSignal::Terminate => terminate(child),
    }
}

#[cfg(unix)]
fn terminate(child: &Child) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    // No graceful signal exists here; fall back to forceful termination.
    child.kill()
}
