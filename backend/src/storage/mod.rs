//! Key-value persistence layer.
//!
//! Every record of the hub is a JSON document stored under a string key. Backends only deal in
//! raw strings; [`JsonStorage`] owns encoding, decoding and the storage quota.

mod json;
mod memory;
mod sqlite;

pub use json::*;
pub use memory::*;
pub use sqlite::*;

use async_trait::async_trait;

use crate::errors::AppError;

/// A single mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: String },
    Delete { key: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// String-keyed storage substrate.
///
/// `write_batch` must apply all operations or none of them, and bumps the revision once per
/// non-empty batch.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value. Missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Apply a set of puts and deletes atomically.
    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), AppError>;

    /// All keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AppError>;

    /// Total bytes held in keys and values.
    async fn size_bytes(&self) -> Result<usize, AppError>;

    /// Monotonic counter of applied batches.
    async fn revision(&self) -> Result<i64, AppError>;

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.write_batch(vec![WriteOp::Put {
            key: key.to_string(),
            value,
        }])
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.write_batch(vec![WriteOp::Delete {
            key: key.to_string(),
        }])
        .await
    }
}
