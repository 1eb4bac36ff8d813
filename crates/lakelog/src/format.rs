//! Record rendering: timestamp, substitution and decoration in one pass.

use crate::config::{Config, ConfigError};
use crate::level::{Level, decorate};
use crate::template::{FormatError, Template, keys};
use crate::timestamp::{TimeFunction, TimestampProvider};
use std::collections::BTreeMap;

/// A rendered log line together with the timestamp it was rendered with.
///
/// The cached copy of a line reuses `timestamp`, so the console and the
/// table never disagree about when a line was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Decorated line, without a trailing newline.
    pub line: String,
    /// Timestamp substituted for `{timestamp}`.
    pub timestamp: String,
}

/// Renders records through a template.
#[derive(Debug, Clone)]
pub struct FormatEngine {
    template: Template,
    timestamps: TimestampProvider,
    environment: String,
    extras: BTreeMap<String, String>,
}

impl FormatEngine {
    /// Builds an engine from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an invalid or malformed template, an
    /// unknown timezone, or an unusable timestamp pattern.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let source = config.effective_template()?;
        let template = Template::parse(source).map_err(ConfigError::MalformedTemplate)?;
        let timestamps = TimestampProvider::new(config.timestamp_pattern(), config.timezone_name())?;
        Ok(Self {
            template,
            timestamps,
            environment: config.environment_name().to_string(),
            extras: config.extras().clone(),
        })
    }

    /// Returns the template in use.
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Returns the environment tag.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Returns the timestamp provider.
    #[must_use]
    pub fn timestamps(&self) -> &TimestampProvider {
        &self.timestamps
    }

    pub(crate) fn set_time_function(&mut self, time_function: TimeFunction) {
        self.timestamps.set_time_function(time_function);
    }

    /// Renders `message` at `level` with a freshly read timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::MissingKey`] if the template names a value
    /// that is neither built in nor among the configured extras.
    pub fn render(&self, level: Level, message: &str) -> Result<Rendered, FormatError> {
        let timestamp = self.timestamps.now();
        let body = self.template.render(|key| match key {
            keys::TIMESTAMP => Some(timestamp.as_str()),
            keys::MESSAGE => Some(message),
            keys::LEVEL => Some(level.as_str()),
            keys::ENVIRONMENT => Some(self.environment.as_str()),
            other => self.extras.get(other).map(String::as_str),
        })?;
        Ok(Rendered {
            line: decorate(level, &body),
            timestamp,
        })
    }
}
