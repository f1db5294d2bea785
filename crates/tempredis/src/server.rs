//! The supervised server handle.

use std::mem;
use std::path::Path;
use std::process::{Child, ExitStatus};
use std::sync::Arc;

use tempredis_config::{PORT_KEY, SOCKET_KEY, ServerConfig};
use tracing::{debug, info, warn};

use crate::error::{AllocationError, LaunchError, ServerError};
use crate::launcher::{Launcher, SpawnedServer, write_config};
use crate::options::{ServerOptions, Transport};
use crate::output::{OutputCapture, OutputLog};
use crate::port::{SocketDir, allocate_ephemeral_port};
use crate::readiness::{ReadinessMarker, ReadinessMonitor};
use crate::signal::{self, StopSignal};
use crate::state::ServerState;

const SERVER_TARGET: &str = "tempredis::server";

/// Port value that disables the server's TCP listener.
const TCP_DISABLED_PORT: &str = "0";

/// A throwaway server process and everything it owns.
///
/// A handle moves through `not started -> running -> stopped` exactly once.
/// Dropping a running handle kills and reaps the process.
///
/// # Example
///
/// ```ignore
/// use tempredis::{Server, ServerConfig};
///
/// let mut server = Server::new(ServerConfig::new().with("databases", "4"));
/// server.start()?;
/// println!("listening on {}", server.url());
/// server.term()?;
/// ```
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    options: ServerOptions,
    state: ServerState,
    stdout: OutputCapture,
    stderr: OutputCapture,
    socket_dir: Option<SocketDir>,
}

impl Server {
    /// Creates a handle for `config` with default options.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_options(config, ServerOptions::default())
    }

    /// Creates a handle for `config` with explicit options.
    #[must_use]
    pub fn with_options(config: ServerConfig, options: ServerOptions) -> Self {
        Self {
            config,
            options,
            state: ServerState::NotStarted,
            stdout: OutputCapture::default(),
            stderr: OutputCapture::default(),
            socket_dir: None,
        }
    }

    /// Launches the server and waits until it reports readiness.
    ///
    /// A port or socket is allocated only when the configuration leaves it
    /// open. On success the configuration reflects the address in use and
    /// the matched marker is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyRunning`] or
    /// [`ServerError::AlreadyStopped`] when the handle is not fresh, an
    /// allocation or launch error when the process cannot be started, and a
    /// readiness error when it never reports ready. Once a process has been
    /// spawned, any failure kills and reaps it and leaves the handle stopped.
    pub fn start(&mut self) -> Result<ReadinessMarker, ServerError> {
        match &self.state {
            ServerState::Running { pid, .. } => {
                return Err(ServerError::AlreadyRunning { pid: *pid });
            }
            ServerState::Stopped => return Err(ServerError::AlreadyStopped),
            ServerState::NotStarted => {}
        }

        let (config, socket_dir) = resolve_address(&self.config, self.options.transport())?;
        config.check_wire().map_err(LaunchError::from)?;
        let launcher = Launcher::new(self.options.binary());
        let SpawnedServer {
            child,
            stdin,
            stdout,
            stderr,
        } = launcher.spawn()?;

        let pid = child.id();
        self.config = config;
        self.socket_dir = socket_dir;
        self.state = ServerState::Running { child, pid };
        info!(
            target: SERVER_TARGET,
            pid,
            binary = %launcher.binary().display(),
            endpoint = %self.config.endpoint(),
            "server process started"
        );

        if let Err(error) = write_config(stdin, &self.config) {
            // A child that exits before reading its config leaves the reason
            // on its output streams.
            self.retain_output(stdout, stderr);
            self.abort_start();
            return Err(error.into());
        }

        let monitor = match self.capture_output(stdout, stderr) {
            Ok(monitor) => monitor,
            Err(error) => {
                self.abort_start();
                return Err(error.into());
            }
        };

        let outcome = monitor.wait_for(self.options.startup_timeout());
        self.stdout = monitor.into_capture();
        match outcome {
            Ok(marker) => {
                info!(target: SERVER_TARGET, pid, %marker, "server is ready");
                Ok(marker)
            }
            Err(error) => {
                warn!(
                    target: SERVER_TARGET,
                    pid,
                    error = %error,
                    "server failed to become ready"
                );
                self.abort_start();
                Err(error)
            }
        }
    }

    fn capture_output<O, E>(
        &mut self,
        stdout: O,
        stderr: E,
    ) -> Result<ReadinessMonitor, LaunchError>
    where
        O: std::io::Read + Send + 'static,
        E: std::io::Read + Send + 'static,
    {
        let monitor = ReadinessMonitor::watch(
            stdout,
            OutputLog::new(),
            self.options.markers().to_vec(),
        )
        .map_err(|source| LaunchError::OutputReader {
            stream: "stdout",
            source: Arc::new(source),
        })?;
        match OutputCapture::spawn_drain(stderr, "stderr") {
            Ok(capture) => {
                self.stderr = capture;
                Ok(monitor)
            }
            Err(source) => {
                self.stdout = monitor.into_capture();
                Err(LaunchError::OutputReader {
                    stream: "stderr",
                    source: Arc::new(source),
                })
            }
        }
    }

    /// Drains both streams without scanning them. Threads that cannot be
    /// started are logged and their stream dropped.
    fn retain_output<O, E>(&mut self, stdout: O, stderr: E)
    where
        O: std::io::Read + Send + 'static,
        E: std::io::Read + Send + 'static,
    {
        match OutputCapture::spawn_drain(stdout, "stdout") {
            Ok(capture) => self.stdout = capture,
            Err(error) => warn_unretained("stdout", &error),
        }
        match OutputCapture::spawn_drain(stderr, "stderr") {
            Ok(capture) => self.stderr = capture,
            Err(error) => warn_unretained("stderr", &error),
        }
    }

    /// Kills a partially started process. Cleanup failures are logged so
    /// the original startup error is the one reported.
    fn abort_start(&mut self) {
        if let ServerState::Running { mut child, pid } =
            mem::replace(&mut self.state, ServerState::Stopped)
        {
            if let Err(error) = child.kill() {
                warn!(target: SERVER_TARGET, pid, error = %error, "failed to kill server");
            }
            if let Err(error) = child.wait() {
                warn!(target: SERVER_TARGET, pid, error = %error, "failed to reap server");
            }
        }
        self.release_socket_dir();
    }

    /// Sends `SIGTERM` and waits for the server to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotRunning`] when no process is attached and
    /// [`ServerError::Termination`] when signalling or waiting fails. The
    /// handle is stopped and its socket directory removed either way.
    pub fn term(&mut self) -> Result<ExitStatus, ServerError> {
        self.stop(StopSignal::Terminate)
    }

    /// Sends `SIGKILL` and waits for the server to exit.
    ///
    /// # Errors
    ///
    /// As for [`Server::term`].
    pub fn kill(&mut self) -> Result<ExitStatus, ServerError> {
        self.stop(StopSignal::Kill)
    }

    fn stop(&mut self, signal: StopSignal) -> Result<ExitStatus, ServerError> {
        let (mut child, pid) = match mem::replace(&mut self.state, ServerState::Stopped) {
            ServerState::Running { child, pid } => (child, pid),
            other => {
                self.state = other;
                return Err(ServerError::NotRunning);
            }
        };

        debug!(target: SERVER_TARGET, pid, %signal, "stopping server");
        let result = signal_and_wait(&mut child, pid, signal);
        self.release_socket_dir();

        if let Ok(status) = &result {
            info!(target: SERVER_TARGET, pid, %status, "server exited");
        }
        result
    }

    fn release_socket_dir(&mut self) {
        if let Some(dir) = self.socket_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(error) = dir.remove() {
                warn!(
                    target: SERVER_TARGET,
                    directory = %path.display(),
                    error = %error,
                    "failed to remove socket directory"
                );
            }
        }
    }

    /// Everything the server wrote to standard output.
    ///
    /// Blocks until the stream closes, which for a running server means
    /// until it exits. A never-started handle returns an empty string.
    pub fn stdout(&mut self) -> String {
        self.stdout.finish()
    }

    /// Everything the server wrote to standard error.
    ///
    /// Blocks like [`Server::stdout`].
    pub fn stderr(&mut self) -> String {
        self.stderr.finish()
    }

    /// Standard output captured so far, without waiting.
    #[must_use]
    pub fn stdout_snapshot(&self) -> String {
        self.stdout.snapshot()
    }

    /// PID of the attached process.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.state.pid()
    }

    /// Reports whether a process is attached.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, ServerState::Running { .. })
    }

    /// Configuration the server runs with, including allocated addresses.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Options the handle was created with.
    #[must_use]
    pub const fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// `bind:port` the server listens on.
    #[must_use]
    pub fn host(&self) -> String {
        self.config.host()
    }

    /// Connection URL, with credentials when a password is configured.
    #[must_use]
    pub fn url(&self) -> String {
        self.config.url()
    }

    /// Unix socket path, if the server listens on one.
    #[must_use]
    pub fn socket(&self) -> Option<&str> {
        self.config.socket()
    }

    /// Private directory holding the socket, if this handle created one.
    #[must_use]
    pub fn socket_dir(&self) -> Option<&Path> {
        self.socket_dir.as_ref().map(SocketDir::path)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let ServerState::Running { mut child, pid } =
            mem::replace(&mut self.state, ServerState::Stopped)
        {
            debug!(target: SERVER_TARGET, pid, "killing server on drop");
            drop(child.kill());
            drop(child.wait());
        }
    }
}

fn warn_unretained(stream: &'static str, error: &std::io::Error) {
    warn!(
        target: SERVER_TARGET,
        stream,
        error = %error,
        "failed to retain server output"
    );
}

fn signal_and_wait(
    child: &mut Child,
    pid: u32,
    signal: StopSignal,
) -> Result<ExitStatus, ServerError> {
    let to_error = |source| ServerError::Termination {
        pid,
        signal,
        source: Arc::new(source),
    };
    if let Err(error) = signal::deliver(child, signal) {
        warn!(
            target: SERVER_TARGET,
            pid,
            %signal,
            error = %error,
            "signal delivery failed; killing server"
        );
        drop(child.kill());
        drop(child.wait());
        return Err(to_error(error));
    }
    child.wait().map_err(to_error)
}

/// Fills in the address the configuration leaves open.
fn resolve_address(
    config: &ServerConfig,
    transport: Transport,
) -> Result<(ServerConfig, Option<SocketDir>), AllocationError> {
    let mut resolved = config.clone();
    let mut socket_dir = None;
    match transport {
        Transport::Tcp => {
            if !resolved.contains_key(PORT_KEY) {
                let port = allocate_ephemeral_port(resolved.bind())?;
                resolved.set(PORT_KEY, port.to_string());
            }
        }
        Transport::UnixSocket => {
            if !resolved.contains_key(SOCKET_KEY) {
                let dir = SocketDir::create()?;
                resolved.set(SOCKET_KEY, dir.socket_path().as_str());
                socket_dir = Some(dir);
            }
            if !resolved.contains_key(PORT_KEY) {
                resolved.set(PORT_KEY, TCP_DISABLED_PORT);
            }
        }
    }
    Ok((resolved, socket_dir))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn tcp_allocation_only_fills_missing_port() {
        let pinned = ServerConfig::new().with("port", "7001");
        let (resolved, dir) = resolve_address(&pinned, Transport::Tcp).expect("resolve");
        assert_eq!(resolved.port(), "7001");
        assert!(dir.is_none());

        let (resolved, dir) =
            resolve_address(&ServerConfig::new(), Transport::Tcp).expect("resolve");
        assert_ne!(resolved.port(), "6379");
        assert!(resolved.port().parse::<u16>().is_ok());
        assert!(dir.is_none());
    }

    #[test]
    fn socket_allocation_creates_private_directory() {
        let (resolved, dir) =
            resolve_address(&ServerConfig::new(), Transport::UnixSocket).expect("resolve");
        let dir = dir.expect("socket directory");

        assert_eq!(resolved.socket(), Some(dir.socket_path().as_str()));
        assert_eq!(resolved.port(), "0");
        assert!(dir.path().is_dir());
    }

    #[test]
    fn configured_socket_is_left_alone() {
        let config = ServerConfig::new()
            .with("unixsocket", "/tmp/custom.sock")
            .with("port", "7002");
        let (resolved, dir) = resolve_address(&config, Transport::UnixSocket).expect("resolve");

        assert_eq!(resolved, config);
        assert!(dir.is_none());
    }

    #[rstest]
    #[case::term(StopSignal::Terminate)]
    #[case::kill(StopSignal::Kill)]
    fn stopping_a_fresh_handle_is_not_running(#[case] signal: StopSignal) {
        let mut server = Server::new(ServerConfig::new());

        assert!(matches!(server.stop(signal), Err(ServerError::NotRunning)));
        assert!(!server.is_running());
        assert_eq!(server.stdout(), "");
        assert_eq!(server.stderr(), "");
    }

    #[test]
    fn missing_binary_leaves_handle_fresh() {
        let options = ServerOptions::new()
            .with_binary("/nonexistent/tempredis/redis-server")
            .with_transport(Transport::UnixSocket);
        let mut server = Server::with_options(ServerConfig::new(), options);

        let error = server.start().expect_err("binary does not exist");
        assert!(matches!(
            error,
            ServerError::Launch(LaunchError::BinaryNotFound { .. })
        ));
        assert!(server.pid().is_none());
        assert!(server.socket_dir().is_none());
        assert!(server.socket().is_none());
        assert!(matches!(server.term(), Err(ServerError::NotRunning)));
    }
}
