//! Runtime for the `tempredis` command-line tool.
//!
//! The tool starts a throwaway server, prints one JSON line describing how
//! to reach it, and keeps it running until interrupted. It then stops the
//! server and exits. The runtime is exposed as a library so tests can
//! substitute the output streams and the shutdown trigger.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use tempredis::{Endpoint, ReadinessMarker, Server};

mod cli;
mod config;
mod errors;
pub mod shutdown;
pub mod telemetry;

use cli::Cli;
use errors::CliError;
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

const CLI_TARGET: &str = "tempredis::cli";

/// Exit code clap uses for usage errors.
const USAGE_EXIT_CODE: u8 = 2;

/// Endpoint description printed once the server is ready.
#[derive(Debug, Serialize)]
struct EndpointReport<'a> {
    pid: Option<u32>,
    host: String,
    url: String,
    socket: Option<&'a str>,
    endpoint: Endpoint,
    marker: String,
}

impl<'a> EndpointReport<'a> {
    fn new(server: &'a Server, marker: ReadinessMarker) -> Self {
        Self {
            pid: server.pid(),
            host: server.host(),
            url: server.url(),
            socket: server.socket(),
            endpoint: server.config().endpoint(),
            marker: marker.to_string(),
        }
    }
}

/// Runs the CLI, waiting for a termination signal before stopping the
/// server.
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, SystemShutdownSignal::install)
}

/// Runs the CLI with a caller-supplied shutdown trigger.
///
/// `shutdown` is built after the arguments parse and before the server
/// starts.
pub fn run_with<I, W, E, S, F>(args: I, stdout: &mut W, stderr: &mut E, shutdown: F) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    S: ShutdownSignal,
    F: FnOnce() -> Result<S, ShutdownError>,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };

    let result = shutdown()
        .map_err(CliError::from)
        .and_then(|mut signal| execute(&cli, stdout, &mut signal));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(stderr, "tempredis: {error}"));
            ExitCode::FAILURE
        }
    }
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    let rendered = error.render();
    if error.use_stderr() {
        drop(write!(stderr, "{rendered}"));
        ExitCode::from(USAGE_EXIT_CODE)
    } else {
        drop(write!(stdout, "{rendered}"));
        ExitCode::SUCCESS
    }
}

fn execute<W: Write, S: ShutdownSignal>(
    cli: &Cli,
    stdout: &mut W,
    shutdown: &mut S,
) -> Result<(), CliError> {
    telemetry::initialise(&cli.log_filter, cli.log_format)?;

    let server_config = config::server_config(cli)?;
    let options = config::server_options(cli);
    let mut server = Server::with_options(server_config, options);
    let marker = server.start().map_err(CliError::Start)?;

    let reported = write_report(stdout, &EndpointReport::new(&server, marker));
    // The server is stopped whether or not reporting and waiting succeeded.
    let waited = reported.and_then(|()| shutdown.wait().map_err(CliError::from));
    let stopped = if cli.force_kill {
        server.kill()
    } else {
        server.term()
    };
    waited?;
    let status = stopped.map_err(CliError::Stop)?;
    info!(target: CLI_TARGET, %status, "server stopped");
    Ok(())
}

fn write_report<W: Write>(stdout: &mut W, report: &EndpointReport<'_>) -> Result<(), CliError> {
    serde_json::to_writer(&mut *stdout, report).map_err(CliError::EncodeReport)?;
    writeln!(stdout).map_err(CliError::Report)?;
    stdout.flush().map_err(CliError::Report)
}
