//! Minimal stand-in for `redis-server`, used to exercise the supervisor
//! without a real server installed.
//!
//! It speaks just enough of the real server's startup contract: the
//! configuration arrives on stdin when invoked as `tempredis-stub-server -`,
//! unknown directives abort with a fatal configuration error, listeners are
//! bound from `bind`/`port`/`unixsocket`, and progress is reported on stdout
//! with the same phrases the real server uses. Every inline command is
//! answered with `+PONG`. `SIGTERM` or `SIGINT` shut it down cleanly.

use std::fmt::Display;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::process::{self, ExitCode};
use std::thread;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tempredis_config::{BIND_KEY, DEFAULT_BIND, ServerConfig, parse_wire};
use thiserror::Error;

const STUB_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directives the stub accepts. Anything else is a fatal configuration error.
const KNOWN_DIRECTIVES: &[&str] = &[
    "appendfsync",
    "appendonly",
    "bind",
    "daemonize",
    "databases",
    "dbfilename",
    "dir",
    "enable-debug-command",
    "io-threads",
    "logfile",
    "loglevel",
    "maxclients",
    "maxmemory",
    "maxmemory-policy",
    "pidfile",
    "port",
    "protected-mode",
    "requirepass",
    "save",
    "supervised",
    "tcp-backlog",
    "tcp-keepalive",
    "timeout",
    "unixsocket",
    "unixsocketperm",
];

#[derive(Debug, Error)]
enum StubError {
    #[error("Usage: tempredis-stub-server -")]
    Usage,

    #[error("failed to read configuration from stdin: {0}")]
    ReadConfig(#[source] io::Error),

    #[error("{reason}")]
    Config {
        line: usize,
        text: String,
        reason: &'static str,
    },

    #[error("Failed listening on port {port} (tcp), aborting.")]
    Tcp {
        address: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed opening Unix socket: {source}")]
    Unix {
        #[source]
        source: io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
}

/// Writes lines in the real server's `pid:role level message` layout.
#[derive(Debug, Clone, Copy)]
struct ServerLog {
    pid: u32,
}

impl ServerLog {
    fn notice(self, message: impl Display) {
        self.emit('*', message);
    }

    fn warning(self, message: impl Display) {
        self.emit('#', message);
    }

    fn emit(self, level: char, message: impl Display) {
        write_stdout(format_args!("{}:M {level} {message}", self.pid));
    }
}

fn write_stdout(line: impl Display) {
    let mut stdout = io::stdout().lock();
    // The supervisor may have stopped reading; there is nowhere to report that.
    drop(writeln!(stdout, "{line}"));
    drop(stdout.flush());
}

fn write_stderr(line: impl Display) {
    let mut stderr = io::stderr().lock();
    drop(writeln!(stderr, "{line}"));
}

struct Listeners {
    tcp: Vec<TcpListener>,
    unix: Option<(UnixListener, PathBuf)>,
}

fn main() -> ExitCode {
    let log = ServerLog { pid: process::id() };
    match run(log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(log, &error);
            ExitCode::FAILURE
        }
    }
}

fn report(log: ServerLog, error: &StubError) {
    match error {
        StubError::Usage => write_stderr(error),
        StubError::Config { line, text, reason } => {
            write_stdout("");
            write_stdout(format_args!(
                "*** FATAL CONFIG FILE ERROR (tempredis stub {STUB_VERSION}) ***"
            ));
            write_stdout(format_args!("Reading the configuration file, at line {line}"));
            write_stdout(format_args!(">>> '{text}'"));
            write_stdout(reason);
        }
        StubError::Tcp {
            address,
            port,
            source,
        } => {
            log.warning(format_args!(
                concat!(
                    "Warning: Could not create server TCP listening socket ",
                    "{}:{}: bind: {}",
                ),
                address, port, source
            ));
            log.warning(error);
        }
        StubError::ReadConfig(_) | StubError::Unix { .. } | StubError::Signals(_) => {
            log.warning(error);
        }
    }
}

fn run(log: ServerLog) -> Result<(), StubError> {
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() != Some("-") || args.next().is_some() {
        return Err(StubError::Usage);
    }

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(StubError::ReadConfig)?;
    let config = load_config(&input)?;

    // Handlers go in before the ready banner so an early SIGTERM is graceful.
    let mut signals = Signals::new([SIGTERM, SIGINT]).map_err(StubError::Signals)?;

    log.notice(format_args!(
        "tempredis stub {STUB_VERSION} starting, pid={}",
        log.pid
    ));
    write_stderr("tempredis stub server: data is kept in memory only");

    let listeners = bind_listeners(&config)?;
    report_persistence(log, &config);
    let transport = if listeners.tcp.is_empty() { "unix" } else { "tcp" };
    let socket_path = serve(listeners);
    log.notice(format_args!("Ready to accept connections {transport}"));

    if signals.forever().next().is_some() {
        log.warning("User requested shutdown...");
    }
    if let Some(path) = socket_path {
        log.notice("Removing the unix socket file.");
        drop(fs::remove_file(path));
    }
    log.warning("Redis is now ready to exit, bye bye...");
    Ok(())
}

fn load_config(input: &str) -> Result<ServerConfig, StubError> {
    for (index, raw) in input.lines().enumerate() {
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let config_error = |reason| StubError::Config {
            line: index + 1,
            text: text.to_owned(),
            reason,
        };
        let Some((key, value)) = text.split_once(' ') else {
            return Err(config_error("Bad directive or wrong number of arguments"));
        };
        if !KNOWN_DIRECTIVES.contains(&key) {
            return Err(config_error("Bad directive or wrong number of arguments"));
        }
        match key {
            "port" if value.parse::<u16>().is_err() => {
                return Err(config_error("Invalid port"));
            }
            "appendonly" | "daemonize" | "protected-mode"
                if !matches!(value, "yes" | "no") =>
            {
                return Err(config_error("argument must be 'yes' or 'no'"));
            }
            _ => {}
        }
    }
    parse_wire(input).map_err(|error| StubError::Config {
        line: 0,
        text: error.to_string(),
        reason: "Bad directive or wrong number of arguments",
    })
}

fn bind_listeners(config: &ServerConfig) -> Result<Listeners, StubError> {
    let port = config
        .port()
        .parse::<u16>()
        .map_err(|_| StubError::Config {
            line: 0,
            text: format!("port {}", config.port()),
            reason: "Invalid port",
        })?;
    let mut tcp = Vec::new();
    if port != 0 {
        let bind = config.get(BIND_KEY).unwrap_or(DEFAULT_BIND);
        for address in bind.split_whitespace() {
            let listener =
                TcpListener::bind((address, port)).map_err(|source| StubError::Tcp {
                    address: address.to_owned(),
                    port,
                    source,
                })?;
            tcp.push(listener);
        }
    }

    let unix = match config.socket() {
        Some(path) => {
            let listener =
                UnixListener::bind(path).map_err(|source| StubError::Unix { source })?;
            Some((listener, PathBuf::from(path)))
        }
        None => None,
    };
    Ok(Listeners { tcp, unix })
}

fn report_persistence(log: ServerLog, config: &ServerConfig) {
    if config.get("appendonly") == Some("yes") {
        log.notice("DB loaded from append only file: 0.000 seconds");
        return;
    }
    let dir = Path::new(config.get("dir").unwrap_or("."));
    let snapshot = dir.join(config.get("dbfilename").unwrap_or("dump.rdb"));
    if snapshot.is_file() {
        log.notice("DB loaded from disk: 0.000 seconds");
    }
}

/// Starts accept loops and returns the socket file to clean up on exit.
fn serve(listeners: Listeners) -> Option<PathBuf> {
    for listener in listeners.tcp {
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                thread::spawn(move || answer_tcp(stream));
            }
        });
    }
    let (listener, path) = listeners.unix?;
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || answer_unix(stream));
        }
    });
    Some(path)
}

fn answer_tcp(stream: TcpStream) {
    if let Ok(reader) = stream.try_clone() {
        answer(reader, stream);
    }
}

fn answer_unix(stream: UnixStream) {
    if let Ok(reader) = stream.try_clone() {
        answer(reader, stream);
    }
}

/// Replies `+PONG` to every inline command until the client disconnects.
fn answer<R: Read, W: Write>(reader: R, mut writer: W) {
    for line in BufReader::new(reader).lines() {
        let Ok(line) = line else { break };
        let command = line.trim();
        // Array and bulk headers of multi-bulk requests carry no command.
        if command.is_empty() || command.starts_with(['*', '$']) {
            continue;
        }
        let reply: &[u8] = if command.eq_ignore_ascii_case("quit") {
            b"+OK\r\n"
        } else {
            b"+PONG\r\n"
        };
        if writer.write_all(reply).is_err() || command.eq_ignore_ascii_case("quit") {
            break;
        }
    }
}
