use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The uniform contract every storage engine adapter satisfies.
///
/// Values are opaque JSON bytes at this level; the typed boundary lives in
/// [`Store`]. Implementations must be callable from multiple threads and
/// must hold their own lock across any existence-check-then-write window
/// the underlying engine does not make atomic.
pub trait Backend: Send + Sync {
    /// Opens or creates the underlying store. An empty `source` selects a
    /// backend-specific default location. Engines without a memory-only
    /// mode must fail when `memory` is requested rather than fall back to
    /// disk. A second call on the same instance fails.
    fn initialize(&self, source: &str, memory: bool) -> Result<()>;

    /// Number of records in the bucket; a bucket that was never written
    /// counts as empty.
    fn count(&self, bucket: &str) -> Result<usize>;

    /// Non-overwriting insert; fails if the key is already present.
    fn create(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Returns the stored bytes for an existing key.
    fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Overwrites an existing key; never creates.
    fn update(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Removes an existing key.
    fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Removes every record in the bucket; removing nothing is not an
    /// error.
    fn drop_bucket(&self, bucket: &str) -> Result<()>;

    /// Every record in the bucket, keyed by record key.
    fn get_all(&self, bucket: &str) -> Result<BTreeMap<String, Vec<u8>>>;
}

/// A typed handle over an initialized backend.
///
/// Records cross this boundary as JSON; any serde-capable type round-trips
/// through any backend identically.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>) -> Store {
        Store { backend }
    }

    pub fn count(&self, bucket: &str) -> Result<usize> {
        self.backend.count(bucket)
    }

    pub fn create<T: Serialize>(&self, bucket: &str, key: &str, record: &T) -> Result<()> {
        let data = serde_json::to_vec(record)?;
        self.backend.create(bucket, key, &data)
    }

    pub fn read<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<T> {
        let data = self.backend.read(bucket, key)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn update<T: Serialize>(&self, bucket: &str, key: &str, record: &T) -> Result<()> {
        let data = serde_json::to_vec(record)?;
        self.backend.update(bucket, key, &data)
    }

    pub fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.backend.delete(bucket, key)
    }

    pub fn drop_bucket(&self, bucket: &str) -> Result<()> {
        self.backend.drop_bucket(bucket)
    }

    /// Returns every record in the bucket, deserialized. One undecodable
    /// record fails the whole call.
    pub fn get<T: DeserializeOwned>(&self, bucket: &str) -> Result<BTreeMap<String, T>> {
        let mut records = BTreeMap::new();

        for (key, data) in self.backend.get_all(bucket)? {
            records.insert(key, serde_json::from_slice(&data)?);
        }

        Ok(records)
    }
}

mod memory;
mod redb;
mod sled;

pub use self::memory::MemoryBackend;
pub use self::redb::RedbBackend;
pub use self::sled::SledBackend;
