//! Line-oriented encoding used to pass a configuration over standard input.
//!
//! Each directive becomes a `key value` line. Empty values are written as
//! [`EMPTY_VALUE_TOKEN`] because the server's grammar would otherwise read a
//! bare key as a directive with a missing argument. Entries that the line
//! format cannot carry (a line break in a value, whitespace in a name) are
//! rejected before anything is written.

use std::io::{self, Write};

use thiserror::Error;

use crate::config::ServerConfig;

/// Token written in place of an empty value.
///
/// The server reads a literal `""` value as empty too, so a value consisting
/// of exactly these two characters cannot be told apart from an empty one
/// and decodes as empty.
pub const EMPTY_VALUE_TOKEN: &str = "\"\"";

/// Errors raised while decoding the wire format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireParseError {
    /// A directive line carried no value.
    #[error("line {line}: directive '{directive}' has no value")]
    MissingValue {
        /// One-based line number.
        line: usize,
        /// Directive name found on the line.
        directive: String,
    },
}

/// Entries that cannot be expressed as a single `key value` line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireEncodeError {
    /// The directive name is empty, starts a comment or contains whitespace
    /// or control characters.
    #[error("invalid directive name {key:?}")]
    InvalidKey {
        /// Offending directive name.
        key: String,
    },
    /// The value would spill onto another line.
    #[error("value of directive '{key}' contains a line break")]
    LineBreakInValue {
        /// Directive whose value was rejected.
        key: String,
    },
}

impl ServerConfig {
    /// Checks that every entry fits on one wire line.
    ///
    /// # Errors
    ///
    /// Returns the first entry, in key order, that would corrupt the stream.
    pub fn check_wire(&self) -> Result<(), WireEncodeError> {
        for (key, value) in self.iter() {
            if !is_wire_key(key) {
                return Err(WireEncodeError::InvalidKey {
                    key: key.to_owned(),
                });
            }
            if value.contains(['\n', '\r']) {
                return Err(WireEncodeError::LineBreakInValue {
                    key: key.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Writes every directive as a `key value` line.
    ///
    /// # Errors
    ///
    /// Fails with [`io::ErrorKind::InvalidInput`] wrapping a
    /// [`WireEncodeError`] before writing anything when an entry cannot be
    /// encoded, and otherwise propagates errors from `writer`.
    pub fn write_wire<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.check_wire()
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        self.write_entries(writer)
    }

    /// Renders the configuration in its wire form.
    ///
    /// # Errors
    ///
    /// As for [`ServerConfig::check_wire`].
    pub fn to_wire(&self) -> Result<String, WireEncodeError> {
        self.check_wire()?;
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        drop(self.write_entries(&mut buffer));
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn write_entries<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (key, value) in self.iter() {
            let value = if value.is_empty() {
                EMPTY_VALUE_TOKEN
            } else {
                value
            };
            writeln!(writer, "{key} {value}")?;
        }
        Ok(())
    }
}

fn is_wire_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('#')
        && !key.contains(|c: char| c.is_whitespace() || c.is_control())
}

/// Decodes the wire form back into a configuration.
///
/// Blank lines and `#` comments are skipped. The value is everything after
/// the first space, so values containing spaces survive unchanged. A value
/// equal to [`EMPTY_VALUE_TOKEN`] decodes as the empty string.
///
/// # Errors
///
/// Returns [`WireParseError::MissingValue`] for a directive with no value.
pub fn parse_wire(input: &str) -> Result<ServerConfig, WireParseError> {
    let mut config = ServerConfig::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.trim_start().split_once(' ') else {
            return Err(WireParseError::MissingValue {
                line: index + 1,
                directive: line.trim().to_owned(),
            });
        };
        let value = if value == EMPTY_VALUE_TOKEN { "" } else { value };
        config.set(key, value);
    }
    Ok(config)
}
