//! Checkpoint storage abstraction
//!
//! The checkpoint between runs lives in an object store. Access goes through
//! the [`CheckpointStore`] trait so the orchestrator never touches an SDK
//! client directly; production uses the S3 backend, tests use the in-memory
//! backend.

pub mod checkpoint;
mod s3;

pub use checkpoint::Checkpoint;
pub use s3::S3CheckpointStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not be reached or initialized
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object read/write failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Checkpoint (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Small object get/put interface for checkpoint persistence.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read an object; `None` when it does not exist.
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Write an object with the given content type.
    async fn write(&self, key: &str, body: Vec<u8>, content_type: &str) -> StorageResult<()>;
}

/// In-memory store used by tests.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let objects = self
            .objects
            .lock()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(objects.get(key).cloned())
    }

    async fn write(&self, key: &str, body: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| StorageError::Io(e.to_string()))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }
}
