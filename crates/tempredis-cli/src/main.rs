//! Entry point for the `tempredis` binary.
//!
//! Delegates to [`tempredis_cli::run`] with the process arguments and
//! standard streams.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    tempredis_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
