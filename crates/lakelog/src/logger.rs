//! The [`Logger`] handle: rendering, console output and caching in one place.
//!
//! Diagnostics printed while initializing or flushing the cache go through
//! the configured template. When the template cannot render them they are
//! still printed, decorated but otherwise verbatim.

use crate::cache::LogRow;
use crate::config::Config;
use crate::format::FormatEngine;
use crate::job::JobIdResolver;
use crate::persist::{CacheState, PersistenceController};
use crate::store::{MemoryTableStore, TableName, TableStore};
use crate::timestamp::TimeFunction;
use crate::level::decorate;
use crate::{Level, Result};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Callback for console write failures.
///
/// The handler is called when an I/O error occurs while writing a line.
/// Without one, the first failure is reported on stderr and later ones are
/// dropped.
///
/// # Example
///
/// ```rust
/// use lakelog::{Config, Logger};
///
/// let logger = Logger::new(Config::new("prod"))
///     .unwrap()
///     .with_error_handler(|err| eprintln!("lakelog: write failed: {err}"));
/// ```
pub type ErrorHandler = Arc<dyn Fn(io::Error) + Send + Sync>;

/// Console sink with the write-failure policy.
struct Console {
    writer: Box<dyn Write + Send + Sync>,
    error_handler: Option<ErrorHandler>,
    /// Whether we've already warned about I/O failures.
    has_warned_io_failure: bool,
    /// Failures waiting for the handler, delivered after the lock is released.
    failures: Vec<io::Error>,
}

impl Console {
    fn stdout() -> Self {
        Self {
            writer: Box::new(io::stdout()),
            error_handler: None,
            has_warned_io_failure: false,
            failures: Vec::new(),
        }
    }

    fn write_line(&mut self, line: &str) {
        let result = self
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());
        let Err(e) = result else {
            return;
        };
        if self.error_handler.is_some() {
            self.failures.push(e);
        } else if !self.has_warned_io_failure {
            // Warn once, then go silent.
            self.has_warned_io_failure = true;
            let _ = io::stderr().write_all(format!("lakelog: write failed: {e}\n").as_bytes());
        }
    }

    fn take_failures(&mut self) -> Option<(ErrorHandler, Vec<io::Error>)> {
        if self.failures.is_empty() {
            return None;
        }
        let handler = self.error_handler.clone()?;
        Some((handler, std::mem::take(&mut self.failures)))
    }
}

/// Internal logger state.
struct LoggerInner {
    config: Config,
    engine: FormatEngine,
    console: Console,
    persistence: PersistenceController,
}

/// A colorized, template-driven logger.
///
/// Each emit method renders one line, writes it to the console sink
/// (stdout unless replaced) and returns it. The `*_cached` variants also
/// buffer a structured copy when caching has been initialized.
///
/// Clones share the same state. Every operation holds one write lock for
/// its whole duration, so rendering, writing and buffering a line happen
/// atomically with respect to other clones.
pub struct Logger {
    inner: Arc<RwLock<LoggerInner>>,
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Logger")
            .field("environment", &inner.config.environment_name())
            .field("template", &inner.engine.template().source())
            .field("timezone", &inner.config.timezone_name())
            .field("persistence", &inner.persistence)
            .finish()
    }
}

impl Logger {
    /// Creates a logger writing to stdout.
    ///
    /// Caching starts disabled, backed by an empty [`MemoryTableStore`] and
    /// the default [`JobIdResolver`] until replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the template,
    /// timezone or timestamp pattern is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let engine = FormatEngine::from_config(&config)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(LoggerInner {
                config,
                engine,
                console: Console::stdout(),
                persistence: PersistenceController::new(
                    MemoryTableStore::new(),
                    JobIdResolver::default(),
                ),
            })),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, LoggerInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LoggerInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the console sink.
    #[must_use]
    pub fn with_writer(self, writer: impl Write + Send + Sync + 'static) -> Self {
        self.write().console.writer = Box::new(writer);
        self
    }

    /// Sets a handler for console write failures.
    #[must_use]
    pub fn with_error_handler<F>(self, handler: F) -> Self
    where
        F: Fn(io::Error) + Send + Sync + 'static,
    {
        self.write().console.error_handler = Some(Arc::new(handler));
        self
    }

    /// Replaces the table store used for caching.
    #[must_use]
    pub fn with_table_store(self, store: impl TableStore + 'static) -> Self {
        self.write().persistence.set_store(Box::new(store));
        self
    }

    /// Replaces the job id resolver used when caching is initialized.
    #[must_use]
    pub fn with_job_resolver(self, resolver: JobIdResolver) -> Self {
        self.write().persistence.set_resolver(resolver);
        self
    }

    /// Replaces the clock used for timestamps.
    #[must_use]
    pub fn with_time_function(self, time_function: TimeFunction) -> Self {
        self.write().engine.set_time_function(time_function);
        self
    }

    /// Returns the configuration the logger was built from.
    #[must_use]
    pub fn config(&self) -> Config {
        self.read().config.clone()
    }

    /// Returns the environment tag.
    #[must_use]
    pub fn environment(&self) -> String {
        self.read().config.environment_name().to_string()
    }

    /// Returns the template text in use, default or custom.
    #[must_use]
    pub fn template(&self) -> String {
        self.read().engine.template().source().to_string()
    }

    /// Renders a line without writing or caching it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`](crate::Error::Format) if a placeholder has
    /// no value.
    pub fn render(&self, level: Level, message: &str) -> Result<String> {
        Ok(self.read().engine.render(level, message)?.line)
    }

    /// Renders, writes and optionally caches one line.
    ///
    /// The displayed and cached copies share a single timestamp reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`](crate::Error::Format) if a placeholder has
    /// no value; nothing is written or cached in that case.
    pub fn log(&self, level: Level, message: &str, cache: bool) -> Result<String> {
        let mut inner = self.write();
        let LoggerInner {
            engine,
            console,
            persistence,
            ..
        } = &mut *inner;

        let rendered = engine.render(level, message)?;
        console.write_line(&rendered.line);
        persistence.record(
            level,
            message,
            &rendered.timestamp,
            engine.environment(),
            cache,
        );

        let failures = console.take_failures();
        drop(inner);
        Self::deliver(failures);
        Ok(rendered.line)
    }

    /// Logs an info message.
    pub fn info(&self, message: &str) -> Result<String> {
        self.log(Level::Info, message, false)
    }

    /// Logs a warning message.
    pub fn warning(&self, message: &str) -> Result<String> {
        self.log(Level::Warning, message, false)
    }

    /// Logs an error message.
    pub fn error(&self, message: &str) -> Result<String> {
        self.log(Level::Error, message, false)
    }

    /// Logs a critical message.
    pub fn critical(&self, message: &str) -> Result<String> {
        self.log(Level::Critical, message, false)
    }

    /// Logs a success message.
    pub fn success(&self, message: &str) -> Result<String> {
        self.log(Level::Success, message, false)
    }

    /// Logs an info message and requests caching.
    pub fn info_cached(&self, message: &str) -> Result<String> {
        self.log(Level::Info, message, true)
    }

    /// Logs a warning message and requests caching.
    pub fn warning_cached(&self, message: &str) -> Result<String> {
        self.log(Level::Warning, message, true)
    }

    /// Logs an error message and requests caching.
    pub fn error_cached(&self, message: &str) -> Result<String> {
        self.log(Level::Error, message, true)
    }

    /// Logs a critical message and requests caching.
    pub fn critical_cached(&self, message: &str) -> Result<String> {
        self.log(Level::Critical, message, true)
    }

    /// Logs a success message and requests caching.
    pub fn success_cached(&self, message: &str) -> Result<String> {
        self.log(Level::Success, message, true)
    }

    /// Enables caching into `table` (`catalog.schema.table`).
    ///
    /// Prints which job id sources were tried. Those lines are never cached.
    ///
    /// # Errors
    ///
    /// See [`PersistenceController::initialize`].
    pub fn initialize_caching(&self, table: &str) -> Result<()> {
        self.with_diagnostics(|persistence, diagnostics| {
            persistence.initialize(table, diagnostics)
        })
    }

    /// Writes all cached rows to the table and returns how many were written.
    ///
    /// # Errors
    ///
    /// See [`PersistenceController::flush`].
    pub fn flush(&self) -> Result<usize> {
        self.with_diagnostics(|persistence, diagnostics| persistence.flush(diagnostics))
    }

    /// Returns `true` once caching has been initialized successfully.
    #[must_use]
    pub fn is_caching(&self) -> bool {
        self.read().persistence.is_enabled()
    }

    /// Returns the caching state.
    #[must_use]
    pub fn cache_state(&self) -> CacheState {
        self.read().persistence.state().clone()
    }

    /// Returns the resolved job run id while caching is enabled.
    #[must_use]
    pub fn job_run_id(&self) -> Option<String> {
        match self.read().persistence.state() {
            CacheState::Enabled { job_run_id, .. } => Some(job_run_id.clone()),
            CacheState::Disabled => None,
        }
    }

    /// Returns the cache table while caching is enabled.
    #[must_use]
    pub fn cache_table(&self) -> Option<TableName> {
        match self.read().persistence.state() {
            CacheState::Enabled { table, .. } => Some(table.clone()),
            CacheState::Disabled => None,
        }
    }

    /// Returns a copy of the rows waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> Vec<LogRow> {
        self.read().persistence.buffer().rows().to_vec()
    }

    /// Runs a persistence operation with console diagnostics wired up.
    fn with_diagnostics<T>(
        &self,
        op: impl FnOnce(&mut PersistenceController, &mut dyn FnMut(Level, &str)) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.write();
        let LoggerInner {
            engine,
            console,
            persistence,
            ..
        } = &mut *inner;

        let mut diagnostics = |level: Level, message: &str| match engine.render(level, message) {
            Ok(rendered) => console.write_line(&rendered.line),
            Err(e) => {
                warn!(error = %e, line = message, "Diagnostic line could not be rendered");
                console.write_line(&decorate(level, message));
            }
        };
        let result = op(persistence, &mut diagnostics);

        let failures = console.take_failures();
        drop(inner);
        Self::deliver(failures);
        result
    }

    fn deliver(failures: Option<(ErrorHandler, Vec<io::Error>)>) {
        if let Some((handler, errors)) = failures {
            for e in errors {
                handler(e);
            }
        }
    }
}
