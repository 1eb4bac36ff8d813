//! Tests for the JSON-lines table store, alone and behind a logger.

mod common;

use common::{TABLE, logger, resolver_with, table};
use lakelog::prelude::*;
use std::fs;
use tempfile::TempDir;

fn row(message: &str) -> LogRow {
    LogRow {
        job_run_id: "run-j".to_string(),
        environment: "prod".to_string(),
        log_timestamp: "2024-06-01 08:15:30".to_string(),
        level: Level::Error,
        message: message.to_string(),
    }
}

mod store {
    use super::*;

    #[test]
    fn table_exists_only_after_creation() {
        let dir = TempDir::new().unwrap();
        let store = JsonLinesTableStore::new(dir.path());
        assert!(!store.table_exists(&table()).unwrap());
        store.create_table(&table()).unwrap();
        assert!(store.table_exists(&table()).unwrap());
        assert!(dir.path().join("main/logs/events.jsonl").is_file());
    }

    #[test]
    fn append_writes_one_json_object_per_line() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonLinesTableStore::new(dir.path());
        store.create_table(&table()).unwrap();
        store
            .append(&table(), &[row("a"), row("b")], WriteMode::APPEND_MERGE)
            .unwrap();

        let text = fs::read_to_string(store.path_for(&table())).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["message"], "a");
        assert_eq!(first["level"], "ERROR");
        assert_eq!(first["job_run_id"], "run-j");
    }

    #[test]
    fn append_mode_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonLinesTableStore::new(dir.path());
        store.create_table(&table()).unwrap();
        store
            .append(&table(), &[row("a")], WriteMode::APPEND_MERGE)
            .unwrap();
        store
            .append(&table(), &[row("b")], WriteMode::APPEND_MERGE)
            .unwrap();
        let messages: Vec<_> = store
            .read_rows(&table())
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, ["a", "b"]);
    }

    #[test]
    fn overwrite_mode_replaces_rows() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonLinesTableStore::new(dir.path());
        store.create_table(&table()).unwrap();
        store
            .append(&table(), &[row("old")], WriteMode::APPEND_MERGE)
            .unwrap();
        let overwrite = WriteMode {
            append: false,
            merge_schema: true,
        };
        store.append(&table(), &[row("new")], overwrite).unwrap();
        let rows = store.read_rows(&table()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, "new");
    }

    #[test]
    fn strict_append_rejects_different_columns() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonLinesTableStore::new(dir.path());
        store.create_table(&table()).unwrap();
        fs::write(
            store.path_for(&table()),
            "{\"message\":\"legacy\",\"severity\":\"INFO\"}\n",
        )
        .unwrap();

        let strict = WriteMode {
            append: true,
            merge_schema: false,
        };
        let err = store.append(&table(), &[row("x")], strict).unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));

        // Schema merge accepts the evolved columns.
        store
            .append(&table(), &[row("x")], WriteMode::APPEND_MERGE)
            .unwrap();
        let text = fs::read_to_string(store.path_for(&table())).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn append_to_missing_table_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonLinesTableStore::new(dir.path());
        let err = store
            .append(&table(), &[row("x")], WriteMode::APPEND_MERGE)
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingTable(_)));
    }
}

mod with_logger {
    use super::*;

    #[test]
    fn flush_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonLinesTableStore::new(dir.path());
        store.create_table(&table()).unwrap();

        let (logger, _) = logger(Config::new("prod"));
        let logger = logger
            .with_table_store(store.clone())
            .with_job_resolver(resolver_with(Some("run-file")));
        logger.initialize_caching(TABLE).unwrap();
        logger.warning_cached("one").unwrap();
        logger.success_cached("two").unwrap();
        assert_eq!(logger.flush().unwrap(), 2);

        let rows = store.read_rows(&table()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].level, Level::Warning);
        assert_eq!(rows[1].level, Level::Success);
        assert!(rows.iter().all(|r| r.job_run_id == "run-file"));
    }

    #[test]
    fn missing_file_means_table_not_found() {
        let dir = TempDir::new().unwrap();
        let (logger, _) = logger(Config::new("prod"));
        let logger = logger
            .with_table_store(JsonLinesTableStore::new(dir.path()))
            .with_job_resolver(resolver_with(Some("run-file")));
        assert!(matches!(
            logger.initialize_caching(TABLE).unwrap_err(),
            Error::TableNotFound(_)
        ));
    }
}
