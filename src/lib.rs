//! This library houses a uniform bucket/key/value contract over embedded
//! key-value storage engines.
//!
//! Every engine adapter satisfies one [`Backend`] trait; a [`Registry`]
//! maps names to registered adapters and hands out initialized [`Store`]
//! handles. Engines without native buckets emulate them by prefixing
//! record keys with the bucket name; engines with native buckets use
//! their own primitive. Either way the observable behavior is identical,
//! so callers can switch engines without changing application code.

mod backends;
mod codec;
mod error;
mod registry;

pub use backends::{Backend, MemoryBackend, RedbBackend, SledBackend, Store};
pub use error::{Error, Result};
pub use registry::Registry;
