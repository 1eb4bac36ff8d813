//! Caching lifecycle and hand-off to the table store.
//!
//! ```text
//!              initialize ok
//!   Disabled ─────────────────▶ Enabled ──┐ record / flush
//!      ▲                          │  ▲     │
//!      └──── job id unresolved ───┘  └─────┘
//! ```
//!
//! A missing table leaves the state as it was. Flushing never leaves
//! `Enabled`.

use crate::cache::{CacheBuffer, LogRow};
use crate::job::JobIdResolver;
use crate::store::{TableName, TableStore, WriteMode};
use crate::{Error, Level, Result};
use tracing::{debug, info, warn};

/// Caching state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheState {
    /// Cache requests are ignored and flushing fails.
    #[default]
    Disabled,
    /// Cache requests are buffered for `table`, tagged with `job_run_id`.
    Enabled {
        /// Target table.
        table: TableName,
        /// Identifier attached to every buffered row.
        job_run_id: String,
    },
}

/// Owns the cache buffer, the table store and the job id resolver.
///
/// Diagnostics meant for the console are passed to a callback rather than
/// written here, so the controller never feeds its own lines back into the
/// buffer.
pub struct PersistenceController {
    state: CacheState,
    buffer: CacheBuffer,
    store: Box<dyn TableStore>,
    resolver: JobIdResolver,
}

impl std::fmt::Debug for PersistenceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceController")
            .field("state", &self.state)
            .field("pending", &self.buffer.len())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl PersistenceController {
    /// Creates a disabled controller.
    pub fn new(store: impl TableStore + 'static, resolver: JobIdResolver) -> Self {
        Self {
            state: CacheState::Disabled,
            buffer: CacheBuffer::new(),
            store: Box::new(store),
            resolver,
        }
    }

    pub(crate) fn set_store(&mut self, store: Box<dyn TableStore>) {
        self.store = store;
    }

    pub(crate) fn set_resolver(&mut self, resolver: JobIdResolver) {
        self.resolver = resolver;
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// Returns `true` when cache requests are being buffered.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self.state, CacheState::Enabled { .. })
    }

    /// Returns the buffered rows.
    #[must_use]
    pub fn buffer(&self) -> &CacheBuffer {
        &self.buffer
    }

    /// Enables caching into `table`.
    ///
    /// Re-initializing while enabled is allowed when nothing is buffered;
    /// the table is checked and the job id resolved again.
    ///
    /// # Errors
    ///
    /// - [`Error::UnflushedEntries`] if enabled with rows still buffered
    /// - [`Error::Config`] if `table` is not `catalog.schema.table`
    /// - [`Error::Store`] if the existence check itself fails
    /// - [`Error::TableNotFound`] if the table does not exist; state unchanged
    /// - [`Error::JobIdentifierUnresolved`] if no strategy produced an id;
    ///   caching is disabled
    pub fn initialize(
        &mut self,
        table: &str,
        diagnostics: &mut dyn FnMut(Level, &str),
    ) -> Result<()> {
        if self.is_enabled() && !self.buffer.is_empty() {
            return Err(Error::UnflushedEntries {
                pending: self.buffer.len(),
            });
        }

        let table: TableName = table.parse()?;
        debug!(table = %table, "Checking table existence");
        if !self.store.table_exists(&table)? {
            warn!(table = %table, "Cache table not found");
            return Err(Error::TableNotFound(table.to_string()));
        }

        diagnostics(Level::Info, &format!("Resolving job run id for caching into {table}"));
        let Some(job_run_id) = self.resolver.resolve(diagnostics) else {
            self.state = CacheState::Disabled;
            warn!(table = %table, "Job run id unresolved; caching disabled");
            diagnostics(
                Level::Warning,
                "Could not resolve a job run id; log caching is disabled",
            );
            return Err(Error::JobIdentifierUnresolved);
        };

        info!(table = %table, job_run_id = %job_run_id, "Log caching enabled");
        diagnostics(
            Level::Info,
            &format!("Log caching enabled for {table} (job run {job_run_id})"),
        );
        self.buffer.clear();
        self.state = CacheState::Enabled { table, job_run_id };
        Ok(())
    }

    /// Buffers a row when caching is enabled and `cache_requested` is set.
    ///
    /// Returns `true` if a row was buffered.
    pub fn record(
        &mut self,
        level: Level,
        message: &str,
        timestamp: &str,
        environment: &str,
        cache_requested: bool,
    ) -> bool {
        if !cache_requested {
            return false;
        }
        let CacheState::Enabled { job_run_id, .. } = &self.state else {
            return false;
        };
        self.buffer.push(LogRow {
            job_run_id: job_run_id.clone(),
            environment: environment.to_string(),
            log_timestamp: timestamp.to_string(),
            level,
            message: message.to_string(),
        });
        true
    }

    /// Writes every buffered row to the table and empties the buffer.
    ///
    /// Returns the number of rows written. An empty buffer writes nothing,
    /// reports a critical diagnostic and returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// - [`Error::CachingNotInitialized`] if caching is disabled
    /// - [`Error::Store`] if the write fails; the buffer is kept for a retry
    pub fn flush(&mut self, diagnostics: &mut dyn FnMut(Level, &str)) -> Result<usize> {
        let CacheState::Enabled { table, .. } = &self.state else {
            return Err(Error::CachingNotInitialized);
        };

        if self.buffer.is_empty() {
            debug!(table = %table, "Flush skipped; buffer empty");
            diagnostics(Level::Critical, "No cached log entries to persist");
            return Ok(0);
        }

        let count = self.buffer.len();
        if let Err(e) = self
            .store
            .append(table, self.buffer.rows(), WriteMode::APPEND_MERGE)
        {
            warn!(table = %table, rows = count, error = %e, "Flush failed; rows kept");
            return Err(e.into());
        }
        self.buffer.clear();

        info!(table = %table, rows = count, "Flushed cached log rows");
        diagnostics(
            Level::Success,
            &format!("Persisted {count} cached log entries to {table}"),
        );
        Ok(count)
    }
}
