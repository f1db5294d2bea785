//! Helpers shared by the integration tests.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use tempredis::{Endpoint, Server, ServerOptions};

/// Generous readiness timeout; the stub normally starts in milliseconds.
pub const STUB_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the stub server built alongside these tests.
pub fn stub_server_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tempredis-stub-server"))
}

/// Options launching the stub server.
pub fn stub_options() -> ServerOptions {
    ServerOptions::new()
        .with_binary(stub_server_binary())
        .with_startup_timeout(STUB_STARTUP_TIMEOUT)
}

/// Sends an inline `PING` over the server's socket or TCP address.
pub fn ping(server: &Server) -> io::Result<String> {
    let endpoint = server.config().endpoint();
    match endpoint {
        Endpoint::Unix { .. } => exchange(UnixStream::connect(endpoint.dial_target())?),
        Endpoint::Tcp { .. } => exchange(TcpStream::connect(endpoint.dial_target())?),
    }
}

fn exchange<S: Read + Write>(mut stream: S) -> io::Result<String> {
    stream.write_all(b"PING\r\n")?;
    let mut reply = String::new();
    BufReader::new(stream).read_line(&mut reply)?;
    Ok(reply.trim_end().to_owned())
}
