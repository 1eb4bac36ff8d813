#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use lakelog::{
    Config, FnJobId, JobIdResolver, LogRow, Logger, LookupError, MemoryTableStore, ParameterJobId,
    StoreError, TableName, TableStore, WriteMode,
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub const TABLE: &str = "main.logs.events";

/// Console sink that keeps everything written to it.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

pub fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 15, 30).unwrap()
}

pub fn resolver_with(job_id: Option<&'static str>) -> JobIdResolver {
    JobIdResolver::standard(
        FnJobId::new("job context", move || match job_id {
            Some(id) => Ok(Some(id.to_string())),
            None => Err(LookupError::Unavailable("not running as a job".to_string())),
        }),
        ParameterJobId::default(),
    )
}

/// A logger capturing its console output, with a fixed clock.
pub fn logger(config: Config) -> (Logger, Captured) {
    let out = Captured::default();
    let logger = Logger::new(config)
        .unwrap()
        .with_writer(out.clone())
        .with_time_function(fixed_clock);
    (logger, out)
}

/// A caching-ready logger over a memory store that has [`TABLE`].
pub fn caching_logger(job_id: Option<&'static str>) -> (Logger, Captured, MemoryTableStore) {
    let store = MemoryTableStore::new().with_table(TABLE).unwrap();
    let (logger, out) = logger(Config::new("prod"));
    let logger = logger
        .with_table_store(store.clone())
        .with_job_resolver(resolver_with(job_id));
    (logger, out, store)
}

pub fn table() -> TableName {
    TABLE.parse().unwrap()
}

/// Store whose writes fail until told otherwise; records every attempt.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryTableStore,
    pub failing: Arc<Mutex<bool>>,
    pub attempts: Arc<Mutex<usize>>,
}

impl FlakyStore {
    pub fn new(table: &str) -> Self {
        Self {
            inner: MemoryTableStore::new().with_table(table).unwrap(),
            failing: Arc::new(Mutex::new(true)),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl TableStore for FlakyStore {
    fn table_exists(&self, table: &TableName) -> Result<bool, StoreError> {
        self.inner.table_exists(table)
    }

    fn append(
        &mut self,
        table: &TableName,
        rows: &[LogRow],
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        *self.attempts.lock().unwrap() += 1;
        if *self.failing.lock().unwrap() {
            return Err(StoreError::Backend("warehouse unavailable".to_string()));
        }
        self.inner.append(table, rows, mode)
    }
}
