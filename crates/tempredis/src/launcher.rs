//! Spawning the server binary and feeding it configuration.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;

use tempredis_config::ServerConfig;
use tracing::debug;

use crate::error::LaunchError;

const LAUNCHER_TARGET: &str = "tempredis::launcher";

/// Argument telling the server to read its configuration from stdin.
const STDIN_CONFIG_ARG: &str = "-";

/// A freshly spawned server with every standard stream piped.
#[derive(Debug)]
pub(crate) struct SpawnedServer {
    pub(crate) child: Child,
    pub(crate) stdin: ChildStdin,
    pub(crate) stdout: ChildStdout,
    pub(crate) stderr: ChildStderr,
}

/// Launches a server binary.
#[derive(Debug, Clone)]
pub(crate) struct Launcher {
    binary: PathBuf,
}

impl Launcher {
    pub(crate) fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub(crate) fn binary(&self) -> &Path {
        &self.binary
    }

    /// Starts `<binary> -` with stdin, stdout and stderr piped.
    pub(crate) fn spawn(&self) -> Result<SpawnedServer, LaunchError> {
        debug!(
            target: LAUNCHER_TARGET,
            binary = %self.binary.display(),
            "spawning server process"
        );

        let mut child = Command::new(&self.binary)
            .arg(STDIN_CONFIG_ARG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    LaunchError::BinaryNotFound {
                        binary: self.binary.clone(),
                        source: Arc::new(source),
                    }
                } else {
                    LaunchError::Spawn {
                        binary: self.binary.clone(),
                        source: Arc::new(source),
                    }
                }
            })?;

        match take_pipes(&mut child) {
            Ok((stdin, stdout, stderr)) => {
                debug!(
                    target: LAUNCHER_TARGET,
                    pid = child.id(),
                    "server process spawned"
                );
                Ok(SpawnedServer {
                    child,
                    stdin,
                    stdout,
                    stderr,
                })
            }
            Err(error) => {
                // Never leave an unsupervised process behind.
                drop(child.kill());
                drop(child.wait());
                Err(error)
            }
        }
    }
}

fn take_pipes(child: &mut Child) -> Result<(ChildStdin, ChildStdout, ChildStderr), LaunchError> {
    let stdin = child
        .stdin
        .take()
        .ok_or(LaunchError::MissingPipe { stream: "stdin" })?;
    let stdout = child
        .stdout
        .take()
        .ok_or(LaunchError::MissingPipe { stream: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(LaunchError::MissingPipe { stream: "stderr" })?;
    Ok((stdin, stdout, stderr))
}

/// Writes `config` in wire form and closes the stream.
pub(crate) fn write_config<W: Write>(
    mut stdin: W,
    config: &ServerConfig,
) -> Result<(), LaunchError> {
    let to_error = |source| LaunchError::ConfigWrite {
        source: Arc::new(source),
    };
    config.write_wire(&mut stdin).map_err(to_error)?;
    stdin.flush().map_err(to_error)?;
    drop(stdin);
    debug!(
        target: LAUNCHER_TARGET,
        entries = config.len(),
        "configuration written to server stdin"
    );
    Ok(())
}
