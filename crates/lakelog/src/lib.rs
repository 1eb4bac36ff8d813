#![forbid(unsafe_code)]
// Allow pedantic lints for early-stage API ergonomics.
#![allow(clippy::nursery)]
#![allow(clippy::pedantic)]

//! # Lakelog
//!
//! Colorized, template-driven logging for batch jobs, with optional
//! buffering of selected lines for bulk persistence to a table.
//!
//! Lakelog provides:
//! - Five severity levels (info, warning, error, critical, success), each
//!   with its own ANSI color
//! - User templates with `{timestamp}`, `{message}`, `{level}`,
//!   `{environment}` and any extra named values
//! - Timezone-aware timestamps with strftime patterns
//! - Per-line opt-in caching, flushed to a [`TableStore`] in one append
//!
//! ## Example
//!
//! ```rust
//! use lakelog::{Config, Logger};
//!
//! let logger = Logger::new(Config::new("prod").timezone("Europe/Berlin"))?;
//! let line = logger.info("Application started")?;
//! assert!(line.contains("Application started"));
//! # Ok::<(), lakelog::Error>(())
//! ```
//!
//! ## Caching
//!
//! ```rust
//! use lakelog::{Config, FnJobId, JobIdResolver, Logger, MemoryTableStore, ParameterJobId};
//!
//! let store = MemoryTableStore::new().with_table("main.logs.events")?;
//! let logger = Logger::new(Config::new("prod"))?
//!     .with_writer(std::io::sink())
//!     .with_table_store(store.clone())
//!     .with_job_resolver(JobIdResolver::standard(
//!         FnJobId::new("scheduler", || Ok(Some("run-7".to_string()))),
//!         ParameterJobId::default(),
//!     ));
//!
//! logger.initialize_caching("main.logs.events")?;
//! logger.warning_cached("disk almost full")?;
//! assert_eq!(logger.flush()?, 1);
//! assert_eq!(store.rows(&"main.logs.events".parse()?).len(), 1);
//! # Ok::<(), lakelog::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod format;
pub mod job;
pub mod level;
mod logger;
pub mod persist;
pub mod store;
pub mod template;
pub mod timestamp;

use thiserror::Error;

pub use cache::{CacheBuffer, LogRow};
pub use config::{Config, ConfigError};
pub use format::{FormatEngine, Rendered};
pub use job::{
    EnvVarJobId, FnJobId, JOB_CONTEXT_VAR, JOB_ID_PARAMETER, JobIdResolver, JobIdStrategy,
    LookupError, ParameterJobId,
};
pub use level::{Level, ParseLevelError, RESET, decorate, decoration_for};
pub use logger::{ErrorHandler, Logger};
pub use persist::{CacheState, PersistenceController};
pub use store::{JsonLinesTableStore, MemoryTableStore, StoreError, TableName, TableStore, WriteMode};
pub use template::{DEFAULT_TEMPLATE, DEV_TEMPLATE, FormatError, Template, default_template, validate};
pub use timestamp::{DEFAULT_TIMESTAMP_FORMAT, DEFAULT_TIMEZONE, TimeFunction, TimestampProvider};

/// Errors returned by lakelog operations.
///
/// # Recovery Strategies
///
/// | Error Variant | Recovery Strategy |
/// |--------------|-------------------|
/// | [`Config`](Error::Config) | Fix the template, timezone, pattern or table name |
/// | [`Format`](Error::Format) | Add the missing value to the configured extras |
/// | [`TableNotFound`](Error::TableNotFound) | Create the table, then initialize again |
/// | [`JobIdentifierUnresolved`](Error::JobIdentifierUnresolved) | Provide a job context or `job_id` parameter |
/// | [`CachingNotInitialized`](Error::CachingNotInitialized) | Call `initialize_caching` first |
/// | [`UnflushedEntries`](Error::UnflushedEntries) | Flush before switching tables |
/// | [`Store`](Error::Store) | Retry the flush; buffered rows are kept |
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration. Raised while building a logger or parsing a
    /// table name.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single render failed.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// The cache table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// No job id strategy produced an identifier. Caching is now disabled.
    #[error("job run identifier could not be resolved; caching is disabled")]
    JobIdentifierUnresolved,

    /// Flush was called while caching is disabled.
    #[error("caching is not initialized; call initialize_caching first")]
    CachingNotInitialized,

    /// Re-initialization would discard buffered rows.
    #[error("cannot re-initialize caching with {pending} unflushed entries; flush first")]
    UnflushedEntries {
        /// Number of rows still buffered.
        pending: usize,
    },

    /// The table store failed.
    #[error("table store error: {0}")]
    Store(#[from] StoreError),
}

/// A specialized [`Result`] type for lakelog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        CacheState, Config, ConfigError, DEFAULT_TEMPLATE, DEFAULT_TIMESTAMP_FORMAT,
        DEFAULT_TIMEZONE, DEV_TEMPLATE, Error, FnJobId, FormatError, JobIdResolver, JobIdStrategy,
        JsonLinesTableStore, Level, LogRow, Logger, MemoryTableStore, ParameterJobId, RESET,
        Result, StoreError, TableName, TableStore, WriteMode,
    };
}
