//! Detection of server readiness from its standard output.
//!
//! A background thread owns the stdout pipe. It reads line by line, records
//! every line in the retained [`OutputLog`], and reports exactly one outcome
//! through a single-slot channel: a marker matched, or the stream ended
//! first. The caller races that outcome against a timer with
//! [`Receiver::recv_timeout`], so a server that never prints a recognisable
//! line cannot block startup indefinitely.
//!
//! Once the outcome is reported the thread keeps draining stdout until the
//! pipe closes. That keeps the retained log complete and stops the server
//! from stalling on a full pipe. The thread ends on its own when the process
//! exits, so it never holds up teardown.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::ServerError;
use crate::output::{LineTee, OutputCapture, OutputLog};

const READINESS_TARGET: &str = "tempredis::readiness";

/// A startup milestone announced on the server's standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessMarker {
    /// The server accepts connections.
    Ready,
    /// A persisted snapshot (RDB) finished loading.
    RdbLoaded,
    /// A persisted append-only log (AOF) finished loading.
    AofLoaded,
}

impl ReadinessMarker {
    /// Case-sensitive phrases announcing this milestone.
    ///
    /// Server releases word the ready banner differently, so more than one
    /// phrase may apply.
    #[must_use]
    pub const fn phrases(self) -> &'static [&'static str] {
        match self {
            Self::Ready => &[
                "Ready to accept connections",
                "The server is now ready to accept connections",
            ],
            Self::RdbLoaded => &["DB loaded from disk"],
            Self::AofLoaded => &["DB loaded from append only file"],
        }
    }

    /// Reports whether `line` announces this milestone.
    #[must_use]
    pub fn matches(self, line: &str) -> bool {
        self.phrases().iter().any(|phrase| line.contains(phrase))
    }
}

impl fmt::Display for ReadinessMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::RdbLoaded => write!(f, "rdb-loaded"),
            Self::AofLoaded => write!(f, "aof-loaded"),
        }
    }
}

#[derive(Debug)]
enum ScanOutcome {
    Ready(ReadinessMarker),
    Ended(Option<io::Error>),
}

/// Watches a server's standard output for readiness markers.
#[derive(Debug)]
pub(crate) struct ReadinessMonitor {
    outcome: Receiver<ScanOutcome>,
    capture: OutputCapture,
    log: OutputLog,
}

impl ReadinessMonitor {
    /// Starts scanning `reader` on a background thread, retaining every
    /// line in `log`.
    pub(crate) fn watch<R>(
        reader: R,
        log: OutputLog,
        markers: Vec<ReadinessMarker>,
    ) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (sender, outcome) = mpsc::sync_channel(1);
        let mut tee = LineTee::new(reader, log.clone());
        let scan = thread::Builder::new()
            .name(String::from("tempredis-stdout"))
            .spawn(move || scan_then_drain(&mut tee, &markers, sender))?;
        Ok(Self {
            outcome,
            capture: OutputCapture::new(log.clone(), scan),
            log,
        })
    }

    /// Blocks until a marker appears, the stream ends, or `timeout` passes.
    pub(crate) fn wait_for(&self, timeout: Duration) -> Result<ReadinessMarker, ServerError> {
        match self.outcome.recv_timeout(timeout) {
            Ok(ScanOutcome::Ready(marker)) => Ok(marker),
            Ok(ScanOutcome::Ended(error)) => Err(ServerError::ReadinessStreamEnded {
                last_line: self.log.last_line(),
                source: error.map(Arc::new),
            }),
            Err(RecvTimeoutError::Timeout) => Err(ServerError::ReadinessTimeout {
                timeout,
                last_line: self.log.last_line(),
            }),
            // The outcome was already consumed by an earlier wait.
            Err(RecvTimeoutError::Disconnected) => Err(ServerError::ReadinessStreamEnded {
                last_line: self.log.last_line(),
                source: None,
            }),
        }
    }

    /// Releases the stdout capture so it can outlive the monitor.
    pub(crate) fn into_capture(self) -> OutputCapture {
        self.capture
    }
}

fn scan_then_drain<R: Read>(
    tee: &mut LineTee<R>,
    markers: &[ReadinessMarker],
    sender: SyncSender<ScanOutcome>,
) {
    let outcome = scan(tee, markers);
    let matched = matches!(outcome, ScanOutcome::Ready(_));
    // The receiver may already have given up after a timeout.
    drop(sender.try_send(outcome));
    drop(sender);
    if matched {
        tee.drain("stdout");
    }
}

fn scan<R: Read>(tee: &mut LineTee<R>, markers: &[ReadinessMarker]) -> ScanOutcome {
    loop {
        match tee.next_line() {
            Ok(Some(line)) => {
                if let Some(marker) = markers.iter().copied().find(|marker| marker.matches(&line)) {
                    debug!(
                        target: READINESS_TARGET,
                        %marker,
                        line = %line,
                        "readiness marker observed"
                    );
                    return ScanOutcome::Ready(marker);
                }
            }
            Ok(None) => return ScanOutcome::Ended(None),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return ScanOutcome::Ended(Some(error)),
        }
    }
}
