use crate::backends::{Backend, Store};
use crate::error::Error;
use crate::Result;
use slog::info;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Table of backend prototypes, keyed by name.
///
/// Adapters register once, at startup; [`Registry::open`] initializes the
/// registered prototype and hands it back as a typed [`Store`]. The
/// prototype is the live instance: every `open` for a name operates on the
/// same object, and a second `open` is rejected by the adapter's
/// re-initialization guard.
pub struct Registry {
    backends: RwLock<BTreeMap<String, Arc<dyn Backend>>>,
    log: slog::Logger,
}

impl Registry {
    pub fn new(log: slog::Logger) -> Registry {
        Registry {
            backends: RwLock::new(BTreeMap::new()),
            log,
        }
    }

    /// Registers a backend prototype under a unique name.
    pub fn register(&self, name: &str, backend: Arc<dyn Backend>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyBackendName);
        }

        let mut backends = self.backends.write().expect("registry lock poisoned");

        match backends.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(Error::AlreadyRegistered(name.to_owned())),
            Entry::Vacant(entry) => {
                entry.insert(backend);
                info!(self.log, "backend registered"; "name" => name);

                Ok(())
            }
        }
    }

    /// Initializes the named backend against `source` and returns a ready
    /// handle.
    pub fn open(&self, name: &str, source: &str, memory: bool) -> Result<Store> {
        let backend = {
            let backends = self.backends.read().expect("registry lock poisoned");

            backends
                .get(name)
                .cloned()
                .ok_or_else(|| Error::NotRegistered(name.to_owned()))?
        };

        backend.initialize(source, memory)?;
        info!(self.log, "backend opened"; "name" => name, "source" => source, "memory" => memory);

        Ok(Store::new(backend))
    }

    /// Sorted list of registered backend names.
    pub fn backends(&self) -> Vec<String> {
        let backends = self.backends.read().expect("registry lock poisoned");

        backends.keys().cloned().collect()
    }
}
