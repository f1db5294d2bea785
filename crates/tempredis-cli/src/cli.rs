//! Command-line arguments for the `tempredis` binary.

use std::path::PathBuf;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueEnum};
use tempredis::ReadinessMarker;
use tempredis_config::{DEFAULT_LOG_FILTER, LogFormat, default_log_format};

/// Readiness milestone selectable on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum WaitFor {
    /// The server accepts connections.
    Ready,
    /// A snapshot finished loading.
    Rdb,
    /// An append-only log finished loading.
    Aof,
}

impl From<WaitFor> for ReadinessMarker {
    fn from(value: WaitFor) -> Self {
        match value {
            WaitFor::Ready => Self::Ready,
            WaitFor::Rdb => Self::RdbLoaded,
            WaitFor::Aof => Self::AofLoaded,
        }
    }
}

/// Runs a throwaway server until interrupted.
#[derive(Parser, Debug)]
#[command(name = "tempredis", version, about)]
pub(crate) struct Cli {
    /// Server executable; defaults to `$TEMPREDIS_SERVER_BIN` or `redis-server`.
    #[arg(long, value_name = "PATH")]
    pub(crate) server_bin: Option<PathBuf>,
    /// Milliseconds to wait for the server to report readiness.
    #[arg(long, value_name = "MS")]
    pub(crate) startup_timeout_ms: Option<u64>,
    /// Listen on a socket in a private temporary directory instead of TCP.
    #[arg(long)]
    pub(crate) unix_socket: bool,
    /// JSON object of directives to start from.
    #[arg(long, value_name = "FILE")]
    pub(crate) config_file: Option<Utf8PathBuf>,
    /// Sets a directive, overriding the configuration file.
    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = parse_directive,
        action = ArgAction::Append
    )]
    pub(crate) directives: Vec<(String, String)>,
    /// Milestone that counts as ready; repeat to accept any of several.
    #[arg(long, value_enum, action = ArgAction::Append)]
    pub(crate) wait_for: Vec<WaitFor>,
    /// Log filter expression (`tracing` `EnvFilter` syntax).
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub(crate) log_filter: String,
    /// Log output format: `json` or `compact`.
    #[arg(long, default_value_t = default_log_format())]
    pub(crate) log_format: LogFormat,
    /// Stop the server with `SIGKILL` instead of `SIGTERM`.
    #[arg(long)]
    pub(crate) force_kill: bool,
}

fn parse_directive(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(format!("invalid directive name '{key}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}
