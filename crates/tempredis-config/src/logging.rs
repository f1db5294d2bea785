//! Output formats for the CLI's diagnostic log.

use strum::{Display, EnumString};

/// How log events are rendered on standard error.
///
/// Parsed case-insensitively from `json` or `compact`; the default lives in
/// [`default_log_format`](crate::default_log_format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event with fields flattened.
    Json,
    /// One terse human-readable line per event.
    Compact,
}

/// Returned when text names no [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;
