//! Timezone-aware timestamp rendering.

use crate::config::ConfigError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Default timestamp pattern.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default timezone identifier.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Source of the current instant.
pub type TimeFunction = fn() -> DateTime<Utc>;

/// Renders the current time in a fixed timezone with a fixed pattern.
///
/// Every call reads the clock again; nothing is cached between lines.
#[derive(Debug, Clone)]
pub struct TimestampProvider {
    pattern: String,
    timezone: Tz,
    time_function: TimeFunction,
}

impl TimestampProvider {
    /// Creates a provider from a chrono strftime pattern and an IANA
    /// timezone name such as `"Europe/Berlin"`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTimezone`] for names chrono-tz does not
    /// know and [`ConfigError::InvalidTimestampPattern`] for patterns chrono
    /// cannot format.
    pub fn new(pattern: &str, timezone: &str) -> Result<Self, ConfigError> {
        let timezone = timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(timezone.to_string()))?;
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimestampPattern(pattern.to_string()));
        }
        Ok(Self {
            pattern: pattern.to_string(),
            timezone,
            time_function: Utc::now,
        })
    }

    /// Replaces the clock. Mostly useful for deterministic output.
    #[must_use]
    pub fn with_time_function(mut self, time_function: TimeFunction) -> Self {
        self.time_function = time_function;
        self
    }

    pub(crate) fn set_time_function(&mut self, time_function: TimeFunction) {
        self.time_function = time_function;
    }

    /// Returns the configured timezone.
    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Returns the configured pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Renders the current instant.
    #[must_use]
    pub fn now(&self) -> String {
        self.format((self.time_function)())
    }

    /// Renders `instant` in the configured timezone.
    #[must_use]
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format(&self.pattern)
            .to_string()
    }
}
