use crate::codec;
use crate::error::Error;
use crate::Result;
use slog::info;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::sync::RwLock;

/// In-memory map backend with an optional JSON snapshot on disk.
///
/// Buckets are emulated through [`codec`]. When opened without memory-only
/// mode the full map is reloaded from `source` at initialization and
/// rewritten after every successful mutation, inside the same write lock
/// that guards the mutation itself. That write lock also spans every
/// existence-check-then-write window, so two racing creates cannot both
/// observe an absent key.
pub struct MemoryBackend {
    inner: RwLock<Option<Inner>>,
    log: slog::Logger,
}

struct Inner {
    data: BTreeMap<String, Vec<u8>>,
    source: String,
    memory: bool,
}

impl Inner {
    fn save(&self) -> Result<()> {
        if self.memory {
            return Ok(());
        }

        let data = serde_json::to_vec(&self.data)?;

        // Write-then-rename so a crash mid-write can't truncate the old
        // snapshot.
        let tmp = format!("{}.tmp", self.source);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.source)?;

        Ok(())
    }
}

impl MemoryBackend {
    pub fn new(log: slog::Logger) -> MemoryBackend {
        MemoryBackend {
            inner: RwLock::new(None),
            log,
        }
    }
}

impl super::Backend for MemoryBackend {
    fn initialize(&self, source: &str, memory: bool) -> Result<()> {
        let mut guard = self.inner.write().expect("memory backend lock poisoned");

        if guard.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let source = if source.is_empty() { "data" } else { source };

        let data = if memory {
            BTreeMap::new()
        } else {
            match fs::read(source) {
                Ok(snapshot) => serde_json::from_slice(&snapshot)?,
                Err(ref e) if e.kind() == ErrorKind::NotFound => {
                    info!(self.log, "creating new database"; "source" => source);
                    BTreeMap::new()
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(self.log, "memory store opened";
              "source" => source, "memory" => memory, "records" => data.len());

        *guard = Some(Inner {
            data,
            source: source.to_owned(),
            memory,
        });

        Ok(())
    }

    fn count(&self, bucket: &str) -> Result<usize> {
        let guard = self.inner.read().expect("memory backend lock poisoned");
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;
        let prefix = codec::prefix(bucket)?;

        Ok(inner
            .data
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .count())
    }

    fn create(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut guard = self.inner.write().expect("memory backend lock poisoned");
        let inner = guard.as_mut().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        if inner.data.contains_key(&physical) {
            return Err(Error::AlreadyExists);
        }

        inner.data.insert(physical, value.to_vec());
        inner.save()
    }

    fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let guard = self.inner.read().expect("memory backend lock poisoned");
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        inner.data.get(&physical).cloned().ok_or(Error::NotFound)
    }

    fn update(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut guard = self.inner.write().expect("memory backend lock poisoned");
        let inner = guard.as_mut().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        if !inner.data.contains_key(&physical) {
            return Err(Error::NotFound);
        }

        inner.data.insert(physical, value.to_vec());
        inner.save()
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let mut guard = self.inner.write().expect("memory backend lock poisoned");
        let inner = guard.as_mut().ok_or(Error::NotInitialized)?;
        let physical = codec::encode(bucket, key)?;

        if inner.data.remove(&physical).is_none() {
            return Err(Error::NotFound);
        }

        inner.save()
    }

    fn drop_bucket(&self, bucket: &str) -> Result<()> {
        let mut guard = self.inner.write().expect("memory backend lock poisoned");
        let inner = guard.as_mut().ok_or(Error::NotInitialized)?;
        let prefix = codec::prefix(bucket)?;

        let doomed: Vec<String> = inner
            .data
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in doomed {
            inner.data.remove(&key);
        }

        inner.save()
    }

    fn get_all(&self, bucket: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let guard = self.inner.read().expect("memory backend lock poisoned");
        let inner = guard.as_ref().ok_or(Error::NotInitialized)?;
        let prefix = codec::prefix(bucket)?;
        let mut records = BTreeMap::new();

        for (physical, value) in inner
            .data
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
        {
            if let Some(key) = codec::decode(physical, bucket) {
                records.insert(key.to_owned(), value.clone());
            }
        }

        Ok(records)
    }
}
