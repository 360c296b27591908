use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("backend not registered: {0}")]
    NotRegistered(String),
    #[error("backend already registered: {0}")]
    AlreadyRegistered(String),
    #[error("backend name is empty")]
    EmptyBackendName,
    #[error("{0} doesn't support memory-only mode")]
    UnsupportedMemoryMode(&'static str),
    #[error("backend not initialized")]
    NotInitialized,
    #[error("backend already initialized")]
    AlreadyInitialized,
    #[error("key already exists")]
    AlreadyExists,
    #[error("key could not be found")]
    NotFound,
    #[error("bucket name may not contain '_': {0}")]
    InvalidBucket(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error(transparent)]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error(transparent)]
    RedbTransaction(#[from] redb::TransactionError),
    #[error(transparent)]
    RedbTable(#[from] redb::TableError),
    #[error(transparent)]
    RedbStorage(#[from] redb::StorageError),
    #[error(transparent)]
    RedbCommit(#[from] redb::CommitError),
}

/// The Result type encapsulates standard result
pub type Result<T> = std::result::Result<T, Error>;
