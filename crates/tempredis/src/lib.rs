//! Supervision of throwaway `redis-server` processes for tests.
//!
//! A [`Server`] launches the server binary with its configuration piped over
//! standard input, waits until the server announces it is ready, and later
//! stops it with `SIGTERM` or `SIGKILL`. When the configuration does not pin
//! an address the handle picks one: a free TCP port, or a socket inside a
//! private temporary directory that is removed when the server stops.
//!
//! Everything the server prints is retained, so a failed startup can be
//! diagnosed from [`Server::stdout`] and [`Server::stderr`].
//!
//! ```ignore
//! use tempredis::{ReadinessMarker, Server, ServerConfig, ServerOptions, Transport};
//!
//! let options = ServerOptions::new().with_transport(Transport::UnixSocket);
//! let mut server = Server::with_options(ServerConfig::new(), options);
//! assert_eq!(server.start()?, ReadinessMarker::Ready);
//! let socket = server.socket().map(str::to_owned);
//! server.term()?;
//! ```

mod error;
mod launcher;
mod options;
mod output;
mod port;
mod readiness;
mod server;
mod signal;
mod state;

pub use error::{AllocationError, LaunchError, ServerError};
pub use options::{DEFAULT_STARTUP_TIMEOUT, ServerOptions, Transport, resolve_server_binary};
pub use port::{SOCKET_FILE_NAME, SocketDir, allocate_ephemeral_port};
pub use readiness::ReadinessMarker;
pub use server::Server;
pub use signal::StopSignal;
pub use tempredis_config::{Endpoint, ServerConfig, WireEncodeError, WireParseError, parse_wire};
