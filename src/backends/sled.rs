use crate::codec;
use crate::error::Error;
use crate::Result;
use slog::info;
use std::collections::BTreeMap;
use std::str;
use std::sync::{Mutex, RwLock};

/// Adapter over sled's flat sorted keyspace.
///
/// Buckets are emulated through [`codec`]; count, drop and enumeration
/// walk `scan_prefix`. sled serializes individual operations but not an
/// existence check paired with a write, so create/update/delete hold
/// `write_lock` across the whole sequence. Memory-only mode maps to a
/// sled temporary store.
pub struct SledBackend {
    db: RwLock<Option<sled::Db>>,
    write_lock: Mutex<()>,
    log: slog::Logger,
}

impl SledBackend {
    pub fn new(log: slog::Logger) -> SledBackend {
        SledBackend {
            db: RwLock::new(None),
            write_lock: Mutex::new(()),
            log,
        }
    }
}

impl super::Backend for SledBackend {
    fn initialize(&self, source: &str, memory: bool) -> Result<()> {
        let mut guard = self.db.write().expect("sled backend lock poisoned");

        if guard.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let source = if source.is_empty() { "data" } else { source };

        let db = if memory {
            sled::Config::new().temporary(true).open()?
        } else {
            sled::open(source)?
        };

        info!(self.log, "sled store opened"; "source" => source, "memory" => memory);

        *guard = Some(db);

        Ok(())
    }

    fn count(&self, bucket: &str) -> Result<usize> {
        let guard = self.db.read().expect("sled backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        let prefix = codec::prefix(bucket)?;
        let mut counter = 0;

        for entry in db.scan_prefix(prefix.as_bytes()) {
            entry?;
            counter += 1;
        }

        Ok(counter)
    }

    fn create(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let guard = self.db.read().expect("sled backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        let _write = self.write_lock.lock().expect("sled write lock poisoned");

        if db.contains_key(physical.as_bytes())? {
            return Err(Error::AlreadyExists);
        }

        db.insert(physical.as_bytes(), value)?;

        Ok(())
    }

    fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let guard = self.db.read().expect("sled backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        match db.get(physical.as_bytes())? {
            Some(value) => Ok(value.to_vec()),
            None => Err(Error::NotFound),
        }
    }

    fn update(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let guard = self.db.read().expect("sled backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        let _write = self.write_lock.lock().expect("sled write lock poisoned");

        if !db.contains_key(physical.as_bytes())? {
            return Err(Error::NotFound);
        }

        db.insert(physical.as_bytes(), value)?;

        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let guard = self.db.read().expect("sled backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        let _write = self.write_lock.lock().expect("sled write lock poisoned");

        if db.remove(physical.as_bytes())?.is_none() {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    fn drop_bucket(&self, bucket: &str) -> Result<()> {
        let guard = self.db.read().expect("sled backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        let prefix = codec::prefix(bucket)?;

        let _write = self.write_lock.lock().expect("sled write lock poisoned");

        let doomed: Vec<sled::IVec> = db
            .scan_prefix(prefix.as_bytes())
            .keys()
            .collect::<std::result::Result<_, _>>()?;

        for physical in doomed {
            db.remove(physical)?;
        }

        Ok(())
    }

    fn get_all(&self, bucket: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let guard = self.db.read().expect("sled backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        let prefix = codec::prefix(bucket)?;
        let mut records = BTreeMap::new();

        for entry in db.scan_prefix(prefix.as_bytes()) {
            let (physical, value) = entry?;

            // Physical keys are always written from &str, so utf8 holds.
            if let Ok(physical) = str::from_utf8(&physical) {
                if let Some(key) = codec::decode(physical, bucket) {
                    records.insert(key.to_owned(), value.to_vec());
                }
            }
        }

        Ok(records)
    }
}
