//! Severity levels and their terminal decorations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// ANSI sequence that clears any decoration applied before it.
pub const RESET: &str = "\x1b[0m";

/// Severity of a log line.
///
/// The set is closed: every emit operation on [`Logger`](crate::Logger)
/// maps to exactly one variant, so rendering never sees an unknown level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Routine progress. Rendered without decoration.
    Info,
    /// Something unexpected that did not stop the job.
    Warning,
    /// A failed operation.
    Error,
    /// A failure that needs immediate attention.
    Critical,
    /// A completed milestone.
    Success,
}

impl Level {
    /// Every level, in severity-table order.
    pub const ALL: [Self; 5] = [
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Success,
    ];

    /// Returns the uppercase name substituted for `{level}`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Success => "SUCCESS",
        }
    }

    /// Returns the ANSI prefix written before a rendered line.
    ///
    /// `Info` has no decoration and returns the empty string.
    #[must_use]
    pub const fn decoration(&self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Warning => "\x1b[33m",
            Self::Error => "\x1b[31m",
            Self::Critical => "\x1b[35m",
            Self::Success => "\x1b[32m",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            "SUCCESS" => Ok(Self::Success),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Looks up the decoration for a level given by name.
///
/// Unknown names fall back to no decoration instead of failing.
///
/// ```rust
/// use lakelog::{decoration_for, Level};
///
/// assert_eq!(decoration_for("warning"), Level::Warning.decoration());
/// assert_eq!(decoration_for("VERBOSE"), "");
/// ```
#[must_use]
pub fn decoration_for(name: &str) -> &'static str {
    name.parse::<Level>().map_or("", |level| level.decoration())
}

/// Wraps already-substituted text in the decoration for `level`.
#[must_use]
pub fn decorate(level: Level, text: &str) -> String {
    let prefix = level.decoration();
    let mut out = String::with_capacity(prefix.len() + text.len() + RESET.len());
    out.push_str(prefix);
    out.push_str(text);
    out.push_str(RESET);
    out
}

/// Error returned when parsing an unknown level name.
///
/// Accepted names (case-insensitive): `info`, `warning`, `error`,
/// `critical`, `success`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid level: {0:?}")]
pub struct ParseLevelError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(Level::Info.as_str(), "INFO");
        assert_eq!(Level::Warning.as_str(), "WARNING");
        assert_eq!(Level::Error.as_str(), "ERROR");
        assert_eq!(Level::Critical.as_str(), "CRITICAL");
        assert_eq!(Level::Success.as_str(), "SUCCESS");
    }

    #[test]
    fn test_decorations_distinct() {
        assert_eq!(Level::Info.decoration(), "");
        let mut seen = std::collections::HashSet::new();
        for level in Level::ALL.iter().filter(|l| **l != Level::Info) {
            assert!(!level.decoration().is_empty());
            assert!(seen.insert(level.decoration()), "{level} shares a color");
        }
    }

    #[test]
    fn test_decorate_wraps_text() {
        assert_eq!(decorate(Level::Error, "boom"), "\x1b[31mboom\x1b[0m");
        assert_eq!(decorate(Level::Info, "plain"), "plain\x1b[0m");
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Success".parse::<Level>().unwrap(), Level::Success);
        // Only the full name is accepted.
        assert!("warn".parse::<Level>().is_err());
    }

    #[test]
    fn test_decoration_for_unknown_falls_back() {
        assert_eq!(decoration_for("critical"), "\x1b[35m");
        assert_eq!(decoration_for("DEBUG"), "");
        assert_eq!(decoration_for(""), "");
    }

    #[test]
    fn test_level_serializes_uppercase() {
        let json = serde_json::to_string(&Level::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}
