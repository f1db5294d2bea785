//! Reservation of addresses for servers whose configuration leaves them open.
//!
//! Ephemeral ports are found by binding a probe listener to port 0 and
//! reading back what the operating system assigned. The probe is closed
//! before the server starts, so another process may grab the port in
//! between. That race is accepted: callers needing certainty should use a
//! Unix socket instead.

use std::net::TcpListener;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::AllocationError;

const PORT_TARGET: &str = "tempredis::port";

/// File name of the socket created inside a [`SocketDir`].
pub const SOCKET_FILE_NAME: &str = "redis.sock";

/// Returns a TCP port on `bind` that was free at the time of the call.
pub fn allocate_ephemeral_port(bind: &str) -> Result<u16, AllocationError> {
    let to_error = |source| AllocationError::EphemeralPort {
        bind: bind.to_owned(),
        source: Arc::new(source),
    };
    let listener = TcpListener::bind((bind, 0)).map_err(to_error)?;
    let port = listener.local_addr().map_err(to_error)?.port();
    drop(listener);
    debug!(target: PORT_TARGET, bind, port, "reserved ephemeral port");
    Ok(port)
}

/// Private temporary directory owning a server's Unix socket.
///
/// The directory is removed by [`SocketDir::remove`] or, failing that, when
/// the value is dropped.
#[derive(Debug)]
pub struct SocketDir {
    dir: TempDir,
    socket_path: Utf8PathBuf,
}

impl SocketDir {
    /// Creates a fresh directory with a unique name.
    pub fn create() -> Result<Self, AllocationError> {
        let dir = tempfile::Builder::new()
            .prefix("tempredis-")
            .tempdir()
            .map_err(|source| AllocationError::SocketDirectory {
                source: Arc::new(source),
            })?;
        let root = Utf8Path::from_path(dir.path()).ok_or_else(|| AllocationError::NonUtf8Path {
            path: dir.path().to_path_buf(),
        })?;
        let socket_path = root.join(SOCKET_FILE_NAME);
        debug!(
            target: PORT_TARGET,
            directory = %root,
            "created socket directory"
        );
        Ok(Self { dir, socket_path })
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Socket path inside the directory.
    #[must_use]
    pub fn socket_path(&self) -> &Utf8Path {
        &self.socket_path
    }

    /// Deletes the directory and everything in it.
    pub fn remove(self) -> std::io::Result<()> {
        self.dir.close()
    }
}
