use crate::codec;
use crate::error::Error;
use crate::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use slog::info;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Adapter over redb, which has native buckets: every bucket is its own
/// table, so the physical-key encoding is bypassed. A bucket that was
/// never written has no table and reads as empty. Each check-then-act
/// sequence runs inside a single write transaction, which redb serializes
/// internally, so no adapter lock is needed. redb is file-backed only;
/// memory-only mode is refused.
///
/// Bucket names are still validated like the flat-keyspace adapters so
/// that a name accepted by one backend is accepted by all of them.
pub struct RedbBackend {
    db: RwLock<Option<Database>>,
    log: slog::Logger,
}

impl RedbBackend {
    pub fn new(log: slog::Logger) -> RedbBackend {
        RedbBackend {
            db: RwLock::new(None),
            log,
        }
    }
}

fn table(bucket: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(bucket)
}

impl super::Backend for RedbBackend {
    fn initialize(&self, source: &str, memory: bool) -> Result<()> {
        if memory {
            return Err(Error::UnsupportedMemoryMode("redb"));
        }

        let mut guard = self.db.write().expect("redb backend lock poisoned");

        if guard.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let source = if source.is_empty() { "data.db" } else { source };
        let db = Database::create(source)?;

        info!(self.log, "redb store opened"; "source" => source);

        *guard = Some(db);

        Ok(())
    }

    fn count(&self, bucket: &str) -> Result<usize> {
        let guard = self.db.read().expect("redb backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        codec::validate_bucket(bucket)?;

        let txn = db.begin_read()?;

        let t = match txn.open_table(table(bucket)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut counter = 0;

        for entry in t.iter()? {
            entry?;
            counter += 1;
        }

        Ok(counter)
    }

    fn create(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let guard = self.db.read().expect("redb backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        codec::validate_bucket(bucket)?;

        let txn = db.begin_write()?;
        {
            let mut t = txn.open_table(table(bucket))?;

            if t.get(key)?.is_some() {
                return Err(Error::AlreadyExists);
            }

            t.insert(key, value)?;
        }
        txn.commit()?;

        Ok(())
    }

    fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let guard = self.db.read().expect("redb backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        codec::validate_bucket(bucket)?;

        let txn = db.begin_read()?;

        let t = match txn.open_table(table(bucket)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Err(Error::NotFound),
            Err(e) => return Err(e.into()),
        };

        match t.get(key)? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(Error::NotFound),
        }
    }

    fn update(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let guard = self.db.read().expect("redb backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        codec::validate_bucket(bucket)?;

        let txn = db.begin_write()?;
        {
            let mut t = txn.open_table(table(bucket))?;

            if t.get(key)?.is_none() {
                return Err(Error::NotFound);
            }

            t.insert(key, value)?;
        }
        txn.commit()?;

        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let guard = self.db.read().expect("redb backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        codec::validate_bucket(bucket)?;

        let txn = db.begin_write()?;
        {
            let mut t = txn.open_table(table(bucket))?;

            if t.remove(key)?.is_none() {
                return Err(Error::NotFound);
            }
        }
        txn.commit()?;

        Ok(())
    }

    fn drop_bucket(&self, bucket: &str) -> Result<()> {
        let guard = self.db.read().expect("redb backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        codec::validate_bucket(bucket)?;

        let txn = db.begin_write()?;
        txn.delete_table(table(bucket))?;
        txn.commit()?;

        Ok(())
    }

    fn get_all(&self, bucket: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let guard = self.db.read().expect("redb backend lock poisoned");
        let db = guard.as_ref().ok_or(Error::NotInitialized)?;
        codec::validate_bucket(bucket)?;

        let txn = db.begin_read()?;

        let t = match txn.open_table(table(bucket)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = BTreeMap::new();

        for entry in t.iter()? {
            let (key, value) = entry?;
            records.insert(key.value().to_owned(), value.value().to_vec());
        }

        Ok(records)
    }
}
