//! Buffered log rows awaiting persistence.

use crate::Level;
use serde::{Deserialize, Serialize};

/// One persisted log line.
///
/// Field names double as the column names of the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    /// Identifier of the job run that produced the line.
    pub job_run_id: String,
    /// Environment tag of the emitting logger.
    pub environment: String,
    /// Timestamp exactly as it was displayed.
    pub log_timestamp: String,
    /// Severity.
    pub level: Level,
    /// Raw message, without template or decoration.
    pub message: String,
}

/// Ordered, append-only buffer of [`LogRow`]s.
///
/// The buffer has no capacity bound. Nothing throttles emission, so a job
/// that caches every line and never flushes grows it without limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheBuffer {
    rows: Vec<LogRow>,
}

impl CacheBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row after all existing rows.
    pub fn push(&mut self, row: LogRow) {
        self.rows.push(row);
    }

    /// Returns the buffered rows in emission order.
    #[must_use]
    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Returns the number of buffered rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Removes and returns every buffered row, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<LogRow> {
        std::mem::take(&mut self.rows)
    }

    /// Discards every buffered row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(message: &str) -> LogRow {
        LogRow {
            job_run_id: "run-1".to_string(),
            environment: "test".to_string(),
            log_timestamp: "2024-01-01 00:00:00".to_string(),
            level: Level::Info,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_push_preserves_order() {
        let mut buffer = CacheBuffer::new();
        buffer.push(row("a"));
        buffer.push(row("b"));
        buffer.push(row("c"));
        let messages: Vec<_> = buffer.rows().iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["a", "b", "c"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_take_empties_buffer() {
        let mut buffer = CacheBuffer::new();
        buffer.push(row("a"));
        let drained = buffer.take();
        assert_eq!(drained.len(), 1);
        assert!(buffer.is_empty());
        assert!(buffer.take().is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = CacheBuffer::new();
        buffer.push(row("a"));
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_row_column_names() {
        let value = serde_json::to_value(row("hello")).unwrap();
        let object = value.as_object().unwrap();
        let mut columns: Vec<_> = object.keys().map(String::as_str).collect();
        columns.sort_unstable();
        assert_eq!(
            columns,
            ["environment", "job_run_id", "level", "log_timestamp", "message"]
        );
        assert_eq!(object["level"], "INFO");
    }
}
