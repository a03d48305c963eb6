//! Configuration and lookup errors.

use std::path::PathBuf;

use thiserror::Error;

/// An invalid or unreadable configuration.
///
/// These are fatal at startup: a broken view table cannot serve any feed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed TOML or has the wrong shape.
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// No Notion API token was configured.
    #[error("Notion API token is required (set NOTION_TOKEN or [notion].api_token)")]
    MissingToken,

    /// The document defines no calendar views.
    #[error("at least one calendar view must be configured")]
    NoViews,

    /// A view lacks a required field.
    #[error("view '{view}': required field '{field}' missing")]
    MissingField { view: String, field: &'static str },

    /// A lookback/lookahead bound is negative or not a number.
    #[error("view '{view}': '{field}' must be a non-negative integer or \"unbounded\"")]
    InvalidDaySpan { view: String, field: &'static str },

    /// The view names a timezone that is not in the IANA database.
    #[error("view '{view}': unknown timezone '{timezone}'")]
    UnknownTimezone { view: String, timezone: String },

    /// Any other invalid setting.
    #[error("invalid setting '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Creates an invalid-setting error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A feed was requested for a view that is not configured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("calendar view '{name}' not found")]
pub struct ViewNotFound {
    /// The requested view name.
    pub name: String,
}

impl ViewNotFound {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
