//! Logger configuration.

use crate::template::{self, FormatError};
use crate::timestamp::{DEFAULT_TIMESTAMP_FORMAT, DEFAULT_TIMEZONE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that make a configuration unusable.
///
/// All of these surface from [`Logger::new`](crate::Logger::new) or from
/// loading a configuration file; no partially built logger is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A custom template uses none of the recognized placeholders.
    #[error("format template {template:?} must contain at least one of: {expected}")]
    InvalidTemplate {
        /// The rejected template.
        template: String,
        /// The recognized placeholders, comma separated.
        expected: String,
    },

    /// A custom template has unbalanced braces or an unnamed placeholder.
    #[error("malformed format template: {0}")]
    MalformedTemplate(#[source] FormatError),

    /// The timezone is not a known IANA identifier.
    #[error("unknown timezone: {0:?}")]
    UnknownTimezone(String),

    /// The timestamp pattern contains a specifier chrono cannot format.
    #[error("invalid timestamp pattern: {0:?}")]
    InvalidTimestampPattern(String),

    /// A table name is not of the form `catalog.schema.table`.
    #[error("invalid table name {0:?}: expected catalog.schema.table")]
    InvalidTableName(String),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A configuration file is not valid TOML for [`Config`].
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration for a [`Logger`](crate::Logger).
///
/// Defaults:
/// - environment tag empty
/// - no custom template (the environment picks a default one)
/// - timestamp pattern `%Y-%m-%d %H:%M:%S`
/// - timezone `UTC`
/// - no extra values
///
/// # Example
///
/// ```rust
/// use lakelog::Config;
///
/// let config = Config::new("prod")
///     .template("{timestamp} {host} {level}: {message}")
///     .timezone("Europe/Berlin")
///     .extra("host", "worker-3");
/// assert_eq!(config.environment_name(), "prod");
/// ```
///
/// The same configuration as TOML:
///
/// ```toml
/// environment = "prod"
/// template = "{timestamp} {host} {level}: {message}"
/// timezone = "Europe/Berlin"
///
/// [extras]
/// host = "worker-3"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    environment: String,
    template: Option<String>,
    timestamp_format: String,
    timezone: String,
    extras: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: String::new(),
            template: None,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            extras: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Creates a configuration for the given environment tag.
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text does not describe a `Config`.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Toml`] if it cannot be parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Sets the environment tag.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Sets a custom template.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Sets the chrono strftime pattern used for `{timestamp}`.
    pub fn timestamp_format(mut self, pattern: impl Into<String>) -> Self {
        self.timestamp_format = pattern.into();
        self
    }

    /// Sets the IANA timezone used for `{timestamp}`.
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Adds an extra value available to the template as `{key}`.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Returns the environment tag.
    pub fn environment_name(&self) -> &str {
        &self.environment
    }

    /// Returns the custom template, if one was set.
    pub fn custom_template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Returns the template the logger will use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTemplate`] if a custom template uses none
    /// of the recognized placeholders. Default templates are not checked.
    pub fn effective_template(&self) -> Result<&str, ConfigError> {
        match self.template.as_deref() {
            Some(custom) => {
                template::validate(custom)?;
                Ok(custom)
            }
            None => Ok(template::default_template(&self.environment)),
        }
    }

    /// Returns the timestamp pattern.
    pub fn timestamp_pattern(&self) -> &str {
        &self.timestamp_format
    }

    /// Returns the timezone identifier.
    pub fn timezone_name(&self) -> &str {
        &self.timezone
    }

    /// Returns the extra substitution values.
    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }
}
