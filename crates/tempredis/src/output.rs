//! Retention of a child's output while it is being scanned.
//!
//! [`LineTee`] hands each line read from a stream to its caller and appends
//! the same line to an [`OutputLog`], so one pass over the pipe both feeds
//! the readiness scan and keeps the full output for later inspection.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::warn;

const OUTPUT_TARGET: &str = "tempredis::output";

/// Append-only text buffer shared between a drain thread and its readers.
///
/// Writers append whole lines under a single lock acquisition so readers
/// never observe a partial line.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputLog {
    inner: Arc<Mutex<LogState>>,
}

#[derive(Debug, Default)]
struct LogState {
    text: String,
    last_line: String,
}

impl OutputLog {
    /// Creates an empty log.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        // A panicking reader cannot leave the text half-written, so recover.
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Appends `line`, which must include its terminator if it had one.
    pub(crate) fn append_line(&self, line: &str) {
        let mut state = self.lock();
        state.text.push_str(line);
        line.trim_end_matches(['\r', '\n'])
            .clone_into(&mut state.last_line);
    }

    /// Copy of everything appended so far.
    #[must_use]
    pub(crate) fn contents(&self) -> String {
        self.lock().text.clone()
    }

    /// Most recent line without its terminator; empty before any output.
    #[must_use]
    pub(crate) fn last_line(&self) -> String {
        self.lock().last_line.clone()
    }
}

/// Reads a stream line by line, recording every line in an [`OutputLog`].
pub(crate) struct LineTee<R> {
    reader: BufReader<R>,
    log: OutputLog,
    buffer: Vec<u8>,
}

impl<R: Read> LineTee<R> {
    pub(crate) fn new(reader: R, log: OutputLog) -> Self {
        Self {
            reader: BufReader::new(reader),
            log,
            buffer: Vec::new(),
        }
    }

    /// Returns the next line (terminator stripped), or `None` at end of
    /// stream. Invalid UTF-8 is replaced rather than treated as an error.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buffer.clear();
        if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buffer);
        self.log.append_line(&line);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }

    /// Consumes the rest of the stream into the log.
    pub(crate) fn drain(&mut self, stream: &'static str) {
        loop {
            match self.next_line() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    warn!(
                        target: OUTPUT_TARGET,
                        stream,
                        error = %error,
                        "stopped reading server output"
                    );
                    break;
                }
            }
        }
    }
}

/// A captured stream: its retained log plus the thread draining it.
#[derive(Debug, Default)]
pub(crate) struct OutputCapture {
    log: OutputLog,
    drain: Option<JoinHandle<()>>,
}

impl OutputCapture {
    pub(crate) const fn new(log: OutputLog, drain: JoinHandle<()>) -> Self {
        Self {
            log,
            drain: Some(drain),
        }
    }

    /// Starts a thread copying `reader` into a fresh log until end of stream.
    pub(crate) fn spawn_drain<R>(reader: R, stream: &'static str) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let log = OutputLog::new();
        let mut tee = LineTee::new(reader, log.clone());
        let drain = thread::Builder::new()
            .name(format!("tempredis-{stream}"))
            .spawn(move || tee.drain(stream))?;
        Ok(Self::new(log, drain))
    }

    /// Non-blocking view of the output captured so far.
    pub(crate) fn snapshot(&self) -> String {
        self.log.contents()
    }

    /// Waits for the stream to close, then returns everything it produced.
    pub(crate) fn finish(&mut self) -> String {
        if let Some(drain) = self.drain.take()
            && drain.join().is_err()
        {
            warn!(target: OUTPUT_TARGET, "output drain thread panicked");
        }
        self.log.contents()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn tee_returns_lines_and_retains_them() {
        let log = OutputLog::new();
        let mut tee = LineTee::new(Cursor::new("first\r\nsecond\nthird"), log.clone());

        assert_eq!(tee.next_line().expect("read"), Some(String::from("first")));
        assert_eq!(log.last_line(), "first");
        assert_eq!(tee.next_line().expect("read"), Some(String::from("second")));
        assert_eq!(tee.next_line().expect("read"), Some(String::from("third")));
        assert_eq!(tee.next_line().expect("read"), None);

        assert_eq!(log.contents(), "first\r\nsecond\nthird");
        assert_eq!(log.last_line(), "third");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let log = OutputLog::new();
        let mut tee = LineTee::new(Cursor::new(vec![b'o', b'k', 0xff, b'\n']), log.clone());

        let line = tee.next_line().expect("read").expect("line");
        assert!(line.starts_with("ok"));
        assert!(log.contents().contains('\u{fffd}'));
    }

    #[test]
    fn capture_finish_returns_complete_output() {
        let mut capture =
            OutputCapture::spawn_drain(Cursor::new("a\nb\n"), "stdout").expect("spawn drain");

        assert_eq!(capture.finish(), "a\nb\n");
        // A second call returns the retained text without joining again.
        assert_eq!(capture.finish(), "a\nb\n");
        assert_eq!(capture.snapshot(), "a\nb\n");
    }

    #[test]
    fn default_capture_is_empty() {
        let mut capture = OutputCapture::default();

        assert_eq!(capture.finish(), "");
    }
}
