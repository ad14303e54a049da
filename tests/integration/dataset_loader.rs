mod support;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use jobscope::{
    dataset::Dataset, query::assembler::ConversionColumns, BoardConfig, DatasetLoader,
    DatasetProvider, FileProvider, JobBoard, JobscopeError, PageRequest, Result,
};
use support::scenario;

/// Serves fixture bytes after a delay, failing the first `failures` fetches.
struct SlowProvider {
    bytes: Bytes,
    delay: Duration,
    failures: usize,
    fetches: Arc<AtomicUsize>,
}

impl SlowProvider {
    fn new(bytes: Vec<u8>, failures: usize) -> (Self, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let provider = Self {
            bytes: Bytes::from(bytes),
            delay: Duration::from_millis(50),
            failures,
            fetches: Arc::clone(&fetches),
        };
        (provider, fetches)
    }
}

impl DatasetProvider for SlowProvider {
    async fn fetch(&self) -> Result<Bytes> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if n < self.failures {
            return Err(JobscopeError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset while fetching dataset",
            )));
        }
        Ok(self.bytes.clone())
    }
}

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let fixture = scenario(false);
    let (provider, fetches) = SlowProvider::new(fixture.bytes(), 0);
    let board = JobBoard::new(provider, BoardConfig::default());
    let request = PageRequest::default();
    let filters = Default::default();

    let (info, page, facets, entity) = tokio::join!(
        board.dataset_info(),
        board.get_page(&request),
        board.get_facets("city", &filters),
        board.get_entity_by_id(1),
    );
    assert_eq!(info.unwrap().size_bytes, fixture.bytes().len() as u64);
    assert_eq!(page.unwrap().total_count, 6);
    assert_eq!(facets.unwrap().len(), 3);
    assert!(entity.unwrap().is_some());
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(board.loader().attempts(), 1);
    assert!(board.loader().is_ready());
}

#[tokio::test]
async fn spawned_callers_share_one_fetch() {
    let fixture = scenario(false);
    let (provider, fetches) = SlowProvider::new(fixture.bytes(), 0);
    let loader = Arc::new(DatasetLoader::new(provider, None));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { loader.get().await.map(|d| d.info().fingerprint) })
        })
        .collect();
    let mut fingerprints = Vec::new();
    for handle in handles {
        fingerprints.push(handle.await.expect("join").expect("load"));
    }
    fingerprints.dedup();
    assert_eq!(fingerprints.len(), 1);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_is_shared_then_retried() {
    let fixture = scenario(false);
    let (provider, fetches) = SlowProvider::new(fixture.bytes(), 1);
    let loader = DatasetLoader::new(provider, None);

    let (first, second) = tokio::join!(loader.get(), loader.get());
    for result in [first, second] {
        match result {
            Err(JobscopeError::DatasetLoad { attempt, reason }) => {
                assert_eq!(attempt, 1);
                assert!(reason.contains("connection reset"), "{reason}");
            }
            other => panic!("expected a load failure, got {other:?}"),
        }
    }
    assert!(!loader.is_ready());

    loader.get().await.expect("retry succeeds");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert_eq!(loader.attempts(), 2);
    loader.get().await.expect("cached");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn abandoned_leader_hands_over_to_a_waiter() {
    let fixture = scenario(false);
    let (provider, fetches) = SlowProvider::new(fixture.bytes(), 0);
    let loader = DatasetLoader::new(provider, None);

    let (timed_out, waited) = tokio::join!(
        tokio::time::timeout(Duration::from_millis(5), loader.get()),
        loader.get(),
    );
    assert!(timed_out.is_err());
    waited.expect("waiter takes over");
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert!(loader.is_ready());
}

#[tokio::test]
async fn missing_file_can_appear_later() {
    let fixture = scenario(false);
    let target = fixture.dir().join("late.db");
    let loader = DatasetLoader::new(FileProvider::new(&target), None);

    let err = loader.get().await.unwrap_err();
    assert_eq!(err.code(), "DatasetLoad");

    std::fs::copy(fixture.path(), &target).expect("copy dataset");
    let dataset = loader.get().await.expect("second attempt");
    assert_eq!(loader.attempts(), 2);
    assert!(!dataset.info().has_conversion);
}

#[test]
fn conversion_requires_both_columns() {
    let wanted = ConversionColumns::default();
    let with = Dataset::open(&scenario(true).bytes(), Some(&wanted)).expect("open");
    assert!(with.info().has_conversion);
    assert_eq!(with.conversion(), Some(&wanted));

    let without = Dataset::open(&scenario(false).bytes(), Some(&wanted)).expect("open");
    assert!(!without.info().has_conversion);
    assert!(without.conversion().is_none());

    let skipped = Dataset::open(&scenario(true).bytes(), None).expect("open");
    assert!(!skipped.info().has_conversion);
}

#[test]
fn database_without_entity_table_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("other.db");
    let conn = rusqlite::Connection::open(&path).expect("open");
    conn.execute_batch("CREATE TABLE unrelated (id INTEGER PRIMARY KEY);")
        .expect("schema");
    drop(conn);
    let err = Dataset::open(&std::fs::read(&path).expect("read"), None).unwrap_err();
    assert_eq!(err.code(), "InvalidArgument");
}

#[tokio::test(flavor = "current_thread")]
async fn opening_yields_the_runtime_thread() {
    let bytes = Bytes::from(scenario(true).bytes());
    let ticked = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticked = Arc::clone(&ticked);
        tokio::spawn(async move {
            ticked.fetch_add(1, Ordering::SeqCst);
        })
    };
    let dataset = Dataset::materialize(bytes, Some(ConversionColumns::default()))
        .await
        .expect("materialize");
    assert_eq!(ticked.load(Ordering::SeqCst), 1);
    assert!(dataset.info().has_conversion);
    ticker.await.expect("ticker");

    let err = Dataset::materialize(Bytes::from_static(b"not a database"), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "QueryFailed");
}
