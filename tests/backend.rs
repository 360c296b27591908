//! One behavioral suite, run against every backend. A store that passes
//! here is interchangeable with any other registered backend.

use kvbase::{Backend, Error, MemoryBackend, RedbBackend, SledBackend, Store};
use serde::{Deserialize, Serialize};
use slog::{o, Drain};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Model {
    name: String,
}

fn example_model() -> Model {
    Model {
        name: "John Smith".to_owned(),
    }
}

fn test_logger() -> slog::Logger {
    let decorator = slog_term::PlainDecorator::new(std::io::stderr());
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!("test" => true))
}

fn run_suite(store: &Store) {
    test_count(store);
    test_create(store);
    test_read(store);
    test_update(store);
    test_delete(store);
    test_drop(store);
    test_get(store);
    test_bucket_isolation(store);
    test_invalid_bucket(store);
    test_primitive_records(store);
    test_get_decode_failure(store);
    test_concurrent_create(store);
}

fn test_count(store: &Store) {
    store.create("countb", "key", &example_model()).unwrap();

    assert_eq!(store.count("countb").unwrap(), 1);
    assert_eq!(store.count("never-written").unwrap(), 0);
}

fn test_create(store: &Store) {
    store.create("createb", "key", &example_model()).unwrap();

    let duplicate = Model {
        name: "Imposter".to_owned(),
    };
    assert!(matches!(
        store.create("createb", "key", &duplicate),
        Err(Error::AlreadyExists)
    ));

    // The failed create must not have altered the stored record.
    let stored: Model = store.read("createb", "key").unwrap();
    assert_eq!(stored, example_model());
}

fn test_read(store: &Store) {
    store.create("readb", "key", &example_model()).unwrap();

    let stored: Model = store.read("readb", "key").unwrap();
    assert_eq!(stored, example_model());

    assert!(matches!(
        store.read::<Model>("readb", "missing"),
        Err(Error::NotFound)
    ));
    assert!(matches!(
        store.read::<Model>("never-written", "key"),
        Err(Error::NotFound)
    ));
}

fn test_update(store: &Store) {
    assert!(matches!(
        store.update("updateb", "key", &example_model()),
        Err(Error::NotFound)
    ));

    store.create("updateb", "key", &example_model()).unwrap();

    let updated = Model {
        name: "Updated John Smith".to_owned(),
    };
    store.update("updateb", "key", &updated).unwrap();

    let stored: Model = store.read("updateb", "key").unwrap();
    assert_eq!(stored, updated);
}

fn test_delete(store: &Store) {
    store.create("deleteb", "key", &example_model()).unwrap();

    store.delete("deleteb", "key").unwrap();

    assert!(matches!(
        store.delete("deleteb", "key"),
        Err(Error::NotFound)
    ));
    assert!(matches!(
        store.read::<Model>("deleteb", "key"),
        Err(Error::NotFound)
    ));
}

fn test_drop(store: &Store) {
    store.create("dropb", "k0", &example_model()).unwrap();
    store.create("dropb", "k1", &example_model()).unwrap();
    assert_eq!(store.count("dropb").unwrap(), 2);

    store.drop_bucket("dropb").unwrap();

    assert_eq!(store.count("dropb").unwrap(), 0);
    assert!(matches!(
        store.read::<Model>("dropb", "k0"),
        Err(Error::NotFound)
    ));

    // Dropping an already-empty bucket is not an error.
    store.drop_bucket("dropb").unwrap();
}

fn test_get(store: &Store) {
    let one = Model {
        name: "John Smith".to_owned(),
    };
    let two = Model {
        name: "James Green".to_owned(),
    };

    store.create("getb", "keyOne", &one).unwrap();
    store.create("getb", "keyTwo", &two).unwrap();

    let records = store.get::<Model>("getb").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records["keyOne"], one);
    assert_eq!(records["keyTwo"], two);

    assert!(store.get::<Model>("never-written").unwrap().is_empty());
}

fn test_bucket_isolation(store: &Store) {
    // Bucket names that are prefixes of one another must not leak into
    // each other's enumeration, count, or drop.
    store.create("a", "k0", &example_model()).unwrap();
    store.create("ab", "k1", &example_model()).unwrap();

    assert_eq!(store.count("a").unwrap(), 1);
    assert_eq!(store.count("ab").unwrap(), 1);

    let records = store.get::<Model>("a").unwrap();
    assert_eq!(records.len(), 1);
    assert!(records.contains_key("k0"));

    store.drop_bucket("a").unwrap();
    assert_eq!(store.count("a").unwrap(), 0);
    assert_eq!(store.count("ab").unwrap(), 1);
}

fn test_invalid_bucket(store: &Store) {
    assert!(matches!(
        store.create("bad_bucket", "key", &example_model()),
        Err(Error::InvalidBucket(_))
    ));
    assert!(matches!(
        store.count("bad_bucket"),
        Err(Error::InvalidBucket(_))
    ));
}

fn test_concurrent_create(store: &Store) {
    // Two racing creates must never both observe "absent": exactly one
    // wins, every other thread gets AlreadyExists.
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();

            thread::spawn(move || store.create("raceb", "key", &example_model()))
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;

    for handle in handles {
        match handle.join().unwrap() {
            Ok(()) => created += 1,
            Err(Error::AlreadyExists) => duplicates += 1,
            Err(e) => panic!("unexpected error from racing create: {}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);

    let stored: Model = store.read("raceb", "key").unwrap();
    assert_eq!(stored, example_model());
}

fn test_primitive_records(store: &Store) {
    store.create("primb", "n", &42i64).unwrap();
    store.create("primb", "s", &"plain string").unwrap();

    assert_eq!(store.read::<i64>("primb", "n").unwrap(), 42);
    assert_eq!(store.read::<String>("primb", "s").unwrap(), "plain string");
}

fn test_get_decode_failure(store: &Store) {
    store.create("shapeb", "k0", &example_model()).unwrap();

    // One record that doesn't fit the requested shape fails the whole
    // enumeration.
    assert!(matches!(
        store.get::<u32>("shapeb"),
        Err(Error::Json(_))
    ));
}

#[test]
fn memory_backend_memory_only() {
    let backend = Arc::new(MemoryBackend::new(test_logger()));
    backend.initialize("", true).unwrap();

    run_suite(&Store::new(backend));
}

#[test]
fn memory_backend_with_snapshot() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data").to_str().unwrap().to_owned();

    let backend = Arc::new(MemoryBackend::new(test_logger()));
    backend.initialize(&source, false).unwrap();

    run_suite(&Store::new(backend));
}

#[test]
fn memory_backend_snapshot_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data").to_str().unwrap().to_owned();

    {
        let backend = Arc::new(MemoryBackend::new(test_logger()));
        backend.initialize(&source, false).unwrap();

        Store::new(backend)
            .create("users", "1", &example_model())
            .unwrap();
    }

    let backend = Arc::new(MemoryBackend::new(test_logger()));
    backend.initialize(&source, false).unwrap();

    let stored: Model = Store::new(backend).read("users", "1").unwrap();
    assert_eq!(stored, example_model());

    // The snapshot is renamed into place; no scratch file stays behind.
    assert!(!dir.path().join("data.tmp").exists());
}

#[test]
fn sled_backend_on_disk() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data").to_str().unwrap().to_owned();

    let backend = Arc::new(SledBackend::new(test_logger()));
    backend.initialize(&source, false).unwrap();

    run_suite(&Store::new(backend));
}

#[test]
fn sled_backend_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data").to_str().unwrap().to_owned();

    // The sled::Db must be dropped before reopening so its flush-on-drop
    // runs and the directory lock is released.
    {
        let backend = Arc::new(SledBackend::new(test_logger()));
        backend.initialize(&source, false).unwrap();

        Store::new(backend)
            .create("users", "1", &example_model())
            .unwrap();
    }

    let backend = Arc::new(SledBackend::new(test_logger()));
    backend.initialize(&source, false).unwrap();

    let stored: Model = Store::new(backend).read("users", "1").unwrap();
    assert_eq!(stored, example_model());
}

#[test]
fn sled_backend_memory_only() {
    let backend = Arc::new(SledBackend::new(test_logger()));
    backend.initialize("", true).unwrap();

    run_suite(&Store::new(backend));
}

#[test]
fn redb_backend_on_disk() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data.db").to_str().unwrap().to_owned();

    let backend = Arc::new(RedbBackend::new(test_logger()));
    backend.initialize(&source, false).unwrap();

    run_suite(&Store::new(backend));
}

#[test]
fn redb_backend_rejects_memory_only() {
    let backend = RedbBackend::new(test_logger());

    assert!(matches!(
        backend.initialize("", true),
        Err(Error::UnsupportedMemoryMode("redb"))
    ));
}

#[test]
fn redb_backend_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("data.db").to_str().unwrap().to_owned();

    {
        let backend = Arc::new(RedbBackend::new(test_logger()));
        backend.initialize(&source, false).unwrap();

        Store::new(backend)
            .create("users", "1", &example_model())
            .unwrap();
    }

    let backend = Arc::new(RedbBackend::new(test_logger()));
    backend.initialize(&source, false).unwrap();

    let stored: Model = Store::new(backend).read("users", "1").unwrap();
    assert_eq!(stored, example_model());
}

#[test]
fn operations_before_initialize_fail_fast() {
    let backend = MemoryBackend::new(test_logger());

    assert!(matches!(backend.count("bucket"), Err(Error::NotInitialized)));
    assert!(matches!(
        backend.create("bucket", "key", b"{}"),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        backend.read("bucket", "key"),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn reinitialize_is_rejected() {
    let backend = MemoryBackend::new(test_logger());

    backend.initialize("", true).unwrap();

    assert!(matches!(
        backend.initialize("", true),
        Err(Error::AlreadyInitialized)
    ));
}
