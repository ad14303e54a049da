//! Dataset acquisition and the single-flight loader.
//!
//! The dataset is fetched once per process. Callers arriving while a fetch is
//! in flight wait on the same attempt. A failed or abandoned attempt returns
//! the loader to idle so the next caller starts a fresh one.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tokio::task;
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::xxh64;

use crate::error::{JobscopeError, Result};
use crate::query::{assembler::ConversionColumns, catalog::ENTITY_TABLE};
use crate::sqlite_adapter::SqliteExecutor;

/// Source of the raw dataset bytes.
pub trait DatasetProvider: Send + Sync + 'static {
    /// Fetches the complete dataset file.
    fn fetch(&self) -> impl Future<Output = Result<Bytes>> + Send;

    /// Short description used in logs.
    fn describe(&self) -> String {
        "dataset".to_owned()
    }
}

/// Reads the dataset from a local file.
#[derive(Clone, Debug)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    /// Provider for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path read on every fetch.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetProvider for FileProvider {
    async fn fetch(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Serves bytes already in memory.
#[derive(Clone, Debug)]
pub struct StaticProvider {
    bytes: Bytes,
}

impl StaticProvider {
    /// Provider returning `bytes` on every fetch.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl DatasetProvider for StaticProvider {
    async fn fetch(&self) -> Result<Bytes> {
        Ok(self.bytes.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory ({} bytes)", self.bytes.len())
    }
}

/// Facts recorded when a dataset is opened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    /// Size of the dataset file.
    pub size_bytes: u64,
    /// xxh64 of the dataset bytes.
    pub fingerprint: u64,
    /// Whether converted salary columns are present and projected.
    pub has_conversion: bool,
}

/// Opened, read-only dataset.
pub struct Dataset {
    executor: SqliteExecutor,
    info: DatasetInfo,
    conversion: Option<ConversionColumns>,
    _file: NamedTempFile,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset").field("info", &self.info).finish()
    }
}

impl Dataset {
    /// Materializes `bytes` to a private temporary file and opens it
    /// read-only.
    ///
    /// Fails when the bytes are not a database holding the entity table.
    /// Converted salary columns are kept only when the entity table has both.
    pub fn open(bytes: &[u8], conversion: Option<&ConversionColumns>) -> Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        let executor = SqliteExecutor::open_read_only(file.path())?;
        if !executor.table_exists(ENTITY_TABLE)? {
            return Err(JobscopeError::InvalidArgument(format!(
                "dataset has no {ENTITY_TABLE} table"
            )));
        }
        let conversion = match conversion.filter(|c| c.is_valid()) {
            Some(wanted) => {
                let columns = executor.table_columns(ENTITY_TABLE)?;
                let present = |name: &str| columns.iter().any(|c| c == name);
                (present(&wanted.min_column) && present(&wanted.max_column)).then(|| wanted.clone())
            }
            None => None,
        };
        let info = DatasetInfo {
            size_bytes: bytes.len() as u64,
            fingerprint: xxh64(bytes, 0),
            has_conversion: conversion.is_some(),
        };
        Ok(Self {
            executor,
            info,
            conversion,
            _file: file,
        })
    }

    /// Runs [`Dataset::open`] on the blocking pool so the file write and the
    /// SQLite open never stall a runtime worker.
    pub async fn materialize(bytes: Bytes, conversion: Option<ConversionColumns>) -> Result<Self> {
        task::spawn_blocking(move || Self::open(&bytes, conversion.as_ref())).await?
    }

    /// Executor bound to this dataset.
    pub fn executor(&self) -> &SqliteExecutor {
        &self.executor
    }

    /// Facts recorded at open time.
    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Converted salary columns, if the dataset has them.
    pub fn conversion(&self) -> Option<&ConversionColumns> {
        self.conversion.as_ref()
    }
}

type Outcome = std::result::Result<Arc<Dataset>, (u64, String)>;

enum LoadState {
    Idle,
    Loading(watch::Receiver<Option<Outcome>>),
    Ready(Arc<Dataset>),
}

enum Step {
    Done(Arc<Dataset>),
    Wait(watch::Receiver<Option<Outcome>>),
    Lead(watch::Sender<Option<Outcome>>),
}

/// Returns the loader to idle if the leading attempt is dropped mid-flight.
struct ResetOnDrop<'a> {
    state: &'a Mutex<LoadState>,
    armed: bool,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.state.lock() = LoadState::Idle;
        }
    }
}

/// Single-flight guard around a [`DatasetProvider`].
pub struct DatasetLoader<P> {
    provider: P,
    conversion: Option<ConversionColumns>,
    state: Mutex<LoadState>,
    attempts: AtomicU64,
}

impl<P: DatasetProvider> DatasetLoader<P> {
    /// Loader that has not fetched anything yet.
    pub fn new(provider: P, conversion: Option<ConversionColumns>) -> Self {
        Self {
            provider,
            conversion,
            state: Mutex::new(LoadState::Idle),
            attempts: AtomicU64::new(0),
        }
    }

    /// Number of fetches started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Returns `true` once a load has succeeded.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), LoadState::Ready(_))
    }

    /// Resolves the dataset, loading it on first use.
    pub async fn get(&self) -> Result<Arc<Dataset>> {
        loop {
            let step = {
                let mut state = self.state.lock();
                match &*state {
                    LoadState::Ready(dataset) => Step::Done(Arc::clone(dataset)),
                    LoadState::Loading(rx) => Step::Wait(rx.clone()),
                    LoadState::Idle => {
                        let (tx, rx) = watch::channel(None);
                        *state = LoadState::Loading(rx);
                        Step::Lead(tx)
                    }
                }
            };
            match step {
                Step::Done(dataset) => return Ok(dataset),
                Step::Lead(tx) => return self.lead(tx).await,
                Step::Wait(mut rx) => {
                    debug!("dataset load in flight, waiting");
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        // Leader was dropped before finishing; start over.
                        Err(_) => continue,
                    };
                    match outcome {
                        Some(Ok(dataset)) => return Ok(dataset),
                        Some(Err((attempt, reason))) => {
                            return Err(JobscopeError::DatasetLoad { attempt, reason })
                        }
                        None => continue,
                    }
                }
            }
        }
    }

    async fn lead(&self, tx: watch::Sender<Option<Outcome>>) -> Result<Arc<Dataset>> {
        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        let mut reset = ResetOnDrop {
            state: &self.state,
            armed: true,
        };
        info!(source = %self.provider.describe(), attempt, "loading dataset");
        let opened = match self.provider.fetch().await {
            Ok(bytes) => Dataset::materialize(bytes, self.conversion.clone()).await,
            Err(err) => Err(err),
        };
        reset.armed = false;
        match opened {
            Ok(dataset) => {
                let dataset = Arc::new(dataset);
                *self.state.lock() = LoadState::Ready(Arc::clone(&dataset));
                info!(
                    size_bytes = dataset.info().size_bytes,
                    fingerprint = %format!("{:016x}", dataset.info().fingerprint),
                    converted_salaries = dataset.info().has_conversion,
                    "dataset ready"
                );
                tx.send_replace(Some(Ok(Arc::clone(&dataset))));
                Ok(dataset)
            }
            Err(err) => {
                let reason = err.to_string();
                *self.state.lock() = LoadState::Idle;
                warn!(attempt, error = %reason, "dataset load failed");
                tx.send_replace(Some(Err((attempt, reason.clone()))));
                Err(JobscopeError::DatasetLoad { attempt, reason })
            }
        }
    }
}
