//! Error types for the CLI runtime.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use tempredis::ServerError;

use crate::shutdown::ShutdownError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("failed to read configuration file {path}: {source}")]
    ReadConfig {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    ParseConfig {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("configuration file {path}: directive '{key}' must be a string, number or boolean")]
    UnsupportedValue { path: Utf8PathBuf, key: String },
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to start server: {0}")]
    Start(#[source] ServerError),
    #[error("failed to report server endpoint: {0}")]
    Report(#[source] io::Error),
    #[error("failed to encode server endpoint: {0}")]
    EncodeReport(#[source] serde_json::Error),
    #[error("failed to wait for shutdown: {0}")]
    Shutdown(#[from] ShutdownError),
    #[error("failed to stop server: {0}")]
    Stop(#[source] ServerError),
}
