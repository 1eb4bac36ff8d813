//! Table sinks for persisted log rows.
//!
//! The logger only needs two things from a table store: whether a table
//! exists, and a bulk append of rows. [`MemoryTableStore`] keeps rows in
//! process; [`JsonLinesTableStore`] writes one `.jsonl` file per table.

use crate::cache::LogRow;
use crate::config::ConfigError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Fully qualified `catalog.schema.table` name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName {
    catalog: String,
    schema: String,
    table: String,
}

impl TableName {
    /// Returns the catalog part.
    #[must_use]
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Returns the schema part.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Returns the table part.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// A name part is a plain identifier: ASCII letters, digits, `_` and `-`.
///
/// Anything else, path separators included, could make a file-backed store
/// resolve a table outside its root.
fn is_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for TableName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').map(str::trim).collect();
        match parts.as_slice() {
            [catalog, schema, table]
                if is_identifier(catalog) && is_identifier(schema) && is_identifier(table) =>
            {
                Ok(Self {
                    catalog: (*catalog).to_string(),
                    schema: (*schema).to_string(),
                    table: (*table).to_string(),
                })
            }
            _ => Err(ConfigError::InvalidTableName(s.to_string())),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.table)
    }
}

/// How a bulk write treats existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMode {
    /// Keep existing rows and add the new ones after them.
    pub append: bool,
    /// Accept rows whose columns differ from the stored ones.
    pub merge_schema: bool,
}

impl WriteMode {
    /// Append with schema merge, the mode every flush uses.
    pub const APPEND_MERGE: Self = Self {
        append: true,
        merge_schema: true,
    };
}

/// Errors reported by a [`TableStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error in a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A row could not be encoded or a stored row could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The write target does not exist.
    #[error("table {0} does not exist")]
    MissingTable(String),

    /// Columns differ and the write mode does not allow merging.
    #[error("schema mismatch for {table}: stored columns {stored:?}, new columns {incoming:?}")]
    SchemaMismatch {
        /// Target table.
        table: String,
        /// Columns already in the table.
        stored: Vec<String>,
        /// Columns of the rejected rows.
        incoming: Vec<String>,
    },

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

/// A tabular sink for log rows.
pub trait TableStore: Send + Sync {
    /// Returns whether `table` exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot answer.
    fn table_exists(&self, table: &TableName) -> Result<bool, StoreError>;

    /// Writes `rows` to `table` in order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if nothing could be written. Implementations
    /// must not report success for a partial write.
    fn append(
        &mut self,
        table: &TableName,
        rows: &[LogRow],
        mode: WriteMode,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct MemoryTables {
    tables: BTreeMap<TableName, Vec<LogRow>>,
    writes: usize,
}

/// In-process table store.
///
/// Clones share the same tables, so a host can keep one handle to inspect
/// what a logger persisted.
///
/// ```rust
/// use lakelog::{MemoryTableStore, TableStore};
///
/// let store = MemoryTableStore::new().with_table("main.logs.events").unwrap();
/// assert!(store.table_exists(&"main.logs.events".parse().unwrap()).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryTableStore {
    inner: Arc<Mutex<MemoryTables>>,
}

impl MemoryTableStore {
    /// Creates a store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `table` and returns the store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTableName`] for malformed names.
    pub fn with_table(self, table: &str) -> Result<Self, ConfigError> {
        self.create_table(table.parse()?);
        Ok(self)
    }

    /// Creates an empty table. Existing tables are left untouched.
    pub fn create_table(&self, table: TableName) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.tables.entry(table).or_default();
    }

    /// Returns a copy of the rows stored in `table`.
    #[must_use]
    pub fn rows(&self, table: &TableName) -> Vec<LogRow> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.tables.get(table).cloned().unwrap_or_default()
    }

    /// Returns how many successful bulk writes the store has accepted.
    #[must_use]
    pub fn write_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.writes
    }
}

impl TableStore for MemoryTableStore {
    fn table_exists(&self, table: &TableName) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.tables.contains_key(table))
    }

    fn append(
        &mut self,
        table: &TableName,
        rows: &[LogRow],
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let stored = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))?;
        if !mode.append {
            stored.clear();
        }
        stored.extend_from_slice(rows);
        inner.writes += 1;
        Ok(())
    }
}

/// File-backed table store.
///
/// `catalog.schema.table` lives at `<root>/catalog/schema/table.jsonl`,
/// one JSON object per row. A table exists when its file exists.
#[derive(Debug, Clone)]
pub struct JsonLinesTableStore {
    root: PathBuf,
}

impl JsonLinesTableStore {
    /// Creates a store rooted at `root`. Nothing is created on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file that holds `table`.
    #[must_use]
    pub fn path_for(&self, table: &TableName) -> PathBuf {
        self.root
            .join(table.catalog())
            .join(table.schema())
            .join(format!("{}.jsonl", table.table()))
    }

    /// Creates an empty table file, including parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be created.
    pub fn create_table(&self, table: &TableName) -> Result<(), StoreError> {
        let path = self.path_for(table);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(table = %table, path = %path.display(), "Created table file");
        Ok(())
    }

    /// Reads every row stored in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read and
    /// [`StoreError::Serialization`] if a line is not a valid row.
    pub fn read_rows(&self, table: &TableName) -> Result<Vec<LogRow>, StoreError> {
        let file = fs::File::open(self.path_for(table))?;
        let mut rows = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            rows.push(serde_json::from_str(&line)?);
        }
        Ok(rows)
    }

    fn stored_columns(path: &Path) -> Result<Option<BTreeSet<String>>, StoreError> {
        let file = fs::File::open(path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let object: Map<String, Value> = serde_json::from_str(&line)?;
            return Ok(Some(object.keys().cloned().collect()));
        }
        Ok(None)
    }
}

impl TableStore for JsonLinesTableStore {
    fn table_exists(&self, table: &TableName) -> Result<bool, StoreError> {
        Ok(self.path_for(table).is_file())
    }

    fn append(
        &mut self,
        table: &TableName,
        rows: &[LogRow],
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let path = self.path_for(table);
        if !path.is_file() {
            return Err(StoreError::MissingTable(table.to_string()));
        }

        // Encode everything up front so a bad row never leaves a partial write.
        let mut payload = String::new();
        let mut incoming = BTreeSet::new();
        for row in rows {
            let value = serde_json::to_value(row)?;
            if let Value::Object(object) = &value {
                incoming.extend(object.keys().cloned());
            }
            payload.push_str(&serde_json::to_string(&value)?);
            payload.push('\n');
        }

        if mode.append && !mode.merge_schema {
            if let Some(stored) = Self::stored_columns(&path)? {
                if stored != incoming {
                    return Err(StoreError::SchemaMismatch {
                        table: table.to_string(),
                        stored: stored.into_iter().collect(),
                        incoming: incoming.into_iter().collect(),
                    });
                }
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .append(mode.append)
            .truncate(!mode.append)
            .open(&path)?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        debug!(table = %table, rows = rows.len(), "Appended rows to table file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;

    fn row(message: &str) -> LogRow {
        LogRow {
            job_run_id: "run-9".to_string(),
            environment: "prod".to_string(),
            log_timestamp: "2024-01-01 00:00:00".to_string(),
            level: Level::Warning,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_table_name_parse() {
        let name: TableName = "main.logs.events".parse().unwrap();
        assert_eq!(name.catalog(), "main");
        assert_eq!(name.schema(), "logs");
        assert_eq!(name.table(), "events");
        assert_eq!(name.to_string(), "main.logs.events");
    }

    #[test]
    fn test_table_name_rejects_malformed() {
        for bad in ["", "events", "logs.events", "a.b.c.d", "a..c", ".b.c"] {
            assert!(
                matches!(bad.parse::<TableName>(), Err(ConfigError::InvalidTableName(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_table_name_rejects_path_characters() {
        for bad in [
            "/escape.s.t",
            "c./etc.t",
            "c.s.t/../../x",
            "c.s\\t",
            "~.s.t",
            "c s.s.t",
            "c:.s.t",
        ] {
            assert!(
                matches!(bad.parse::<TableName>(), Err(ConfigError::InvalidTableName(_))),
                "accepted {bad:?}"
            );
        }
        assert!("main-1.logs_v2.Events".parse::<TableName>().is_ok());
    }

    #[test]
    fn test_jsonl_paths_stay_under_root() {
        let store = JsonLinesTableStore::new("/data/root");
        for name in ["a.b.c", "main-1.logs_v2.Events", " x . y . z "] {
            let table: TableName = name.parse().unwrap();
            assert!(store.path_for(&table).starts_with("/data/root"), "{name}");
        }
        assert!("/escape.s.t".parse::<TableName>().is_err());
    }

    #[test]
    fn test_memory_store_append_and_read() {
        let mut store = MemoryTableStore::new().with_table("c.s.t").unwrap();
        let table: TableName = "c.s.t".parse().unwrap();
        store
            .append(&table, &[row("one"), row("two")], WriteMode::APPEND_MERGE)
            .unwrap();
        store
            .append(&table, &[row("three")], WriteMode::APPEND_MERGE)
            .unwrap();
        let messages: Vec<_> = store.rows(&table).into_iter().map(|r| r.message).collect();
        assert_eq!(messages, ["one", "two", "three"]);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_memory_store_missing_table() {
        let mut store = MemoryTableStore::new();
        let table: TableName = "c.s.missing".parse().unwrap();
        assert!(!store.table_exists(&table).unwrap());
        let err = store
            .append(&table, &[row("x")], WriteMode::APPEND_MERGE)
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingTable(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_memory_store_clones_share_tables() {
        let store = MemoryTableStore::new();
        let handle = store.clone();
        store.create_table("c.s.t".parse().unwrap());
        assert!(handle.table_exists(&"c.s.t".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_jsonl_path_layout() {
        let store = JsonLinesTableStore::new("/data");
        let table: TableName = "main.logs.events".parse().unwrap();
        assert_eq!(
            store.path_for(&table),
            PathBuf::from("/data/main/logs/events.jsonl")
        );
    }
}
