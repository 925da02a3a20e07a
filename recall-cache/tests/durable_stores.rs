//! Engine wired to the real durable backends.

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::tempdir;

use recall_cache::{Computation, MemoEngine, Ttl};
use recall_store::{FileStore, MemoryStore};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Report {
    region: String,
    total: u64,
}

fn build_report<'a>(
    region: &'a str,
    calls: &'a AtomicUsize,
) -> Computation<impl FnOnce() -> Result<Report, Infallible> + 'a> {
    Computation::capturing(region, move || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Report {
            region: region.to_string(),
            total: region.len() as u64 * 100,
        })
    })
    .named("report")
}

#[test]
fn test_memory_store_outlives_transient_clear() {
    let store = Arc::new(MemoryStore::new());
    let engine = MemoEngine::new().with_durable(store.clone());
    let calls = AtomicUsize::new(0);

    let first = engine.cache(build_report("emea", &calls), None, Ttl::seconds(60));
    engine.clear_transient_cache();
    let second = engine.cache(build_report("emea", &calls), None, Ttl::seconds(60));

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.stats().hits, 1);
    assert_eq!(store.stats().misses, 1);

    engine.clear_durable_cache();
    assert!(store.is_empty());
    engine.cache(build_report("emea", &calls), None, Ttl::seconds(60)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_memory_store_expiry_recomputes() {
    let store = Arc::new(MemoryStore::new());
    let engine = MemoEngine::new().with_durable(store);
    let calls = AtomicUsize::new(0);

    engine.cache(build_report("apac", &calls), None, Ttl::seconds(1)).unwrap();
    std::thread::sleep(Duration::from_millis(1100));
    engine.cache(build_report("apac", &calls), None, Ttl::seconds(1)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_file_store_shared_across_engines() {
    let dir = tempdir().unwrap();
    let calls = AtomicUsize::new(0);

    let first = {
        let engine = MemoEngine::new().with_durable(Arc::new(FileStore::open(dir.path()).unwrap()));
        engine
            .cache(build_report("amer", &calls), Some("report:amer"), Ttl::seconds(300))
            .unwrap()
    };

    let engine = MemoEngine::new().with_durable(Arc::new(FileStore::open(dir.path()).unwrap()));
    let second = engine
        .cache(build_report("amer", &calls), Some("report:amer"), Ttl::seconds(300))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(second.total, 400);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let store = FileStore::open(dir.path()).unwrap();
    let entries = store.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "report:amer");
}

#[test]
fn test_file_store_ephemeral_writes_nothing() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let engine = MemoEngine::new().with_durable(store.clone());
    let calls = AtomicUsize::new(0);

    engine.memoize(build_report("emea", &calls)).unwrap();
    engine.memoize(build_report("emea", &calls)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.entries().unwrap().is_empty());
}

#[test]
fn test_unwritable_store_falls_back() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path().join("store")).unwrap());
    let engine = MemoEngine::new().with_durable(store);
    let calls = AtomicUsize::new(0);

    // Replace the store directory with a plain file so every write fails.
    std::fs::remove_dir_all(dir.path().join("store")).unwrap();
    std::fs::write(dir.path().join("store"), b"").unwrap();

    let value = engine.cache(build_report("emea", &calls), None, Ttl::seconds(60));
    assert_eq!(value.unwrap().total, 400);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unrepresentable_expiry_falls_back() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let engine = MemoEngine::new().with_durable(store.clone());
    let calls = AtomicUsize::new(0);

    let ttl = Ttl::seconds(10_000_000_000_000);
    let value = engine.cache(build_report("emea", &calls), None, ttl).unwrap();

    assert_eq!(value.total, 400);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.entries().unwrap().is_empty());
}

#[test]
fn test_memory_store_accepts_any_ttl() {
    let store = Arc::new(MemoryStore::new());
    let engine = MemoEngine::new().with_durable(store.clone());
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        engine.cache(build_report("emea", &calls), None, Ttl::seconds(u64::MAX)).unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.stats().live, 1);
}
