//! Bucket emulation over a flat keyspace.
//!
//! Engines without native buckets store every record under a single sorted
//! map; the physical key is `<bucket>_<key>` and bucket-wide operations
//! (count, drop, enumerate) walk the `<bucket>_` prefix. The separator is
//! banned from bucket names, which keeps the encoding invertible and stops
//! one bucket's prefix from matching another's records (`a` vs `ab`).

use crate::error::Error;
use crate::Result;

pub const SEPARATOR: char = '_';

/// Rejects bucket names that would make the physical encoding ambiguous.
pub fn validate_bucket(bucket: &str) -> Result<()> {
    if bucket.contains(SEPARATOR) {
        return Err(Error::InvalidBucket(bucket.to_owned()));
    }

    Ok(())
}

/// Maps a (bucket, key) pair to its physical key.
pub fn encode(bucket: &str, key: &str) -> Result<String> {
    validate_bucket(bucket)?;

    let mut physical = String::with_capacity(bucket.len() + 1 + key.len());
    physical.push_str(bucket);
    physical.push(SEPARATOR);
    physical.push_str(key);

    Ok(physical)
}

/// Returns the physical prefix shared by every record in the bucket.
pub fn prefix(bucket: &str) -> Result<String> {
    validate_bucket(bucket)?;

    let mut prefix = String::with_capacity(bucket.len() + 1);
    prefix.push_str(bucket);
    prefix.push(SEPARATOR);

    Ok(prefix)
}

/// Recovers the record key from a physical key known to belong to `bucket`.
///
/// Returns `None` if the physical key was not produced by [`encode`] with
/// that bucket.
pub fn decode<'a>(physical: &'a str, bucket: &str) -> Option<&'a str> {
    let stripped = physical.strip_prefix(bucket)?;
    let mut chars = stripped.chars();

    if chars.next()? != SEPARATOR {
        return None;
    }

    Some(chars.as_str())
}
