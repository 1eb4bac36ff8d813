//! Template validation and keyed placeholder substitution.
//!
//! A template is plain text with `{name}` placeholders. Literal braces are
//! written as `{{` and `}}`. Rendering looks every name up by key and fails
//! on the first name that has no value, so a typo in a template never
//! reaches the console as literal `{typo}` text.

use crate::config::ConfigError;
use thiserror::Error;

/// Placeholder names every logger can substitute.
pub mod keys {
    /// Rendered timestamp.
    pub const TIMESTAMP: &str = "timestamp";
    /// Log message.
    pub const MESSAGE: &str = "message";
    /// Uppercase level name.
    pub const LEVEL: &str = "level";
    /// Environment tag from the configuration.
    pub const ENVIRONMENT: &str = "environment";

    /// The four names a custom template must use at least one of.
    pub const RECOGNIZED: [&str; 4] = [TIMESTAMP, MESSAGE, LEVEL, ENVIRONMENT];
}

/// Default template for development environments.
pub const DEV_TEMPLATE: &str = "[{timestamp}][{environment}][{level}]: {message}";

/// Default template for every other environment.
pub const DEFAULT_TEMPLATE: &str = "[{timestamp}][{level}]: {message}";

/// Returns the default template for an environment tag.
///
/// The tag is compared case-insensitively against `"dev"`.
#[must_use]
pub fn default_template(environment: &str) -> &'static str {
    if environment.eq_ignore_ascii_case("dev") {
        DEV_TEMPLATE
    } else {
        DEFAULT_TEMPLATE
    }
}

/// Checks that `template` contains at least one recognized placeholder.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTemplate`] naming all four placeholders
/// when none of them occurs in `template`.
pub fn validate(template: &str) -> Result<(), ConfigError> {
    let found = keys::RECOGNIZED
        .iter()
        .any(|key| template.contains(&format!("{{{key}}}")));
    if found {
        Ok(())
    } else {
        Err(ConfigError::InvalidTemplate {
            template: template.to_string(),
            expected: keys::RECOGNIZED
                .iter()
                .map(|key| format!("{{{key}}}"))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// Errors raised while parsing or rendering a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A placeholder names a value that was not supplied.
    #[error("no value for placeholder {{{0}}}")]
    MissingKey(String),

    /// A `{` without a closing `}`.
    #[error("unmatched '{{' at byte {0}")]
    UnmatchedOpenBrace(usize),

    /// A single `}` outside any placeholder.
    #[error("single '}}' encountered at byte {0}")]
    UnmatchedCloseBrace(usize),

    /// A `{}` with no name inside.
    #[error("empty placeholder at byte {0}; placeholders must be named")]
    EmptyPlaceholder(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source` into literal text and named placeholders.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] for unbalanced braces or empty placeholders.
    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if chars.next_if(|&(_, n)| n == '{').is_some() {
                        literal.push('{');
                        continue;
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        if n == '{' {
                            return Err(FormatError::UnmatchedOpenBrace(pos));
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(FormatError::UnmatchedOpenBrace(pos));
                    }
                    if name.is_empty() {
                        return Err(FormatError::EmptyPlaceholder(pos));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    if chars.next_if(|&(_, n)| n == '}').is_some() {
                        literal.push('}');
                    } else {
                        return Err(FormatError::UnmatchedCloseBrace(pos));
                    }
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Returns the template text as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Iterates over the placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitutes every placeholder with the value `lookup` returns for it.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::MissingKey`] for the first placeholder that
    /// `lookup` has no value for.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lakelog::Template;
    ///
    /// let template = Template::parse("{level}: {message}").unwrap();
    /// let out = template
    ///     .render(|key| match key {
    ///         "level" => Some("INFO"),
    ///         "message" => Some("ready"),
    ///         _ => None,
    ///     })
    ///     .unwrap();
    /// assert_eq!(out, "INFO: ready");
    /// ```
    pub fn render<'a, F>(&self, lookup: F) -> Result<String, FormatError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut out = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = lookup(name).ok_or_else(|| FormatError::MissingKey(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
