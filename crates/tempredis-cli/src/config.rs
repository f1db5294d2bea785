//! Assembly of the server configuration and options from CLI arguments.
//!
//! Directives come from the optional JSON file first, then `--set` flags in
//! the order given, so a later flag overrides both the file and any earlier
//! flag for the same key.

use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use serde_json::Value;
use tempredis::{ReadinessMarker, ServerOptions, Transport, resolve_server_binary};
use tempredis_config::ServerConfig;

use crate::cli::Cli;
use crate::errors::CliError;

pub(crate) fn server_config(cli: &Cli) -> Result<ServerConfig, CliError> {
    let mut config = match &cli.config_file {
        Some(path) => read_config_file(path)?,
        None => ServerConfig::new(),
    };
    config.extend(cli.directives.iter().cloned());
    Ok(config)
}

fn read_config_file(path: &Utf8Path) -> Result<ServerConfig, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_owned(),
        source,
    })?;
    let raw: BTreeMap<String, Value> =
        serde_json::from_str(&text).map_err(|source| CliError::ParseConfig {
            path: path.to_owned(),
            source,
        })?;

    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            Value::Number(number) => Ok((key, number.to_string())),
            Value::Bool(flag) => Ok((key, String::from(if flag { "yes" } else { "no" }))),
            Value::Null | Value::Array(_) | Value::Object(_) => Err(CliError::UnsupportedValue {
                path: path.to_owned(),
                key,
            }),
        })
        .collect()
}

pub(crate) fn server_options(cli: &Cli) -> ServerOptions {
    let mut options = ServerOptions::new()
        .with_binary(resolve_server_binary(cli.server_bin.as_deref()))
        .with_markers(cli.wait_for.iter().copied().map(ReadinessMarker::from));
    if let Some(millis) = cli.startup_timeout_ms {
        options = options.with_startup_timeout(Duration::from_millis(millis));
    }
    if cli.unix_socket {
        options = options.with_transport(Transport::UnixSocket);
    }
    options
}
