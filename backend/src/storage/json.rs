//! JSON facade over a [`KeyValueStore`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{KeyValueStore, WriteOp};
use crate::errors::AppError;

/// Ordered set of JSON writes applied atomically by [`JsonStorage::apply`].
#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<WriteOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON-encoded put.
    pub fn put<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), AppError> {
        let value = serde_json::to_string(value)?;
        self.ops.push(WriteOp::Put {
            key: key.into(),
            value,
        });
        Ok(())
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(WriteOp::Delete { key: key.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Typed get/set/remove over a raw key-value backend.
///
/// Reads never fail on bad data: a value that does not decode is logged and reported as absent.
/// Writes always report their outcome.
#[derive(Clone)]
pub struct JsonStorage {
    backend: Arc<dyn KeyValueStore>,
    quota_bytes: Option<usize>,
}

impl JsonStorage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            quota_bytes: None,
        }
    }

    /// Limit the total size of stored keys and values.
    pub fn with_quota(mut self, quota_bytes: Option<usize>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::warn!(key, error = %err, "Discarding malformed stored value");
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let mut batch = Batch::new();
        batch.put(key, value)?;
        self.apply(batch).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        let mut batch = Batch::new();
        batch.delete(key);
        self.apply(batch).await
    }

    /// Apply every write in `batch` or none of them.
    pub async fn apply(&self, batch: Batch) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }
        if let Some(quota) = self.quota_bytes {
            self.check_quota(&batch, quota).await?;
        }
        self.backend.write_batch(batch.ops).await
    }

    pub async fn keys(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        self.backend.keys(prefix).await
    }

    pub async fn revision(&self) -> Result<i64, AppError> {
        self.backend.revision().await
    }

    /// Reject batches that would grow the store past `quota`. Shrinking writes always pass.
    async fn check_quota(&self, batch: &Batch, quota: usize) -> Result<(), AppError> {
        // Last write per key wins
        let mut final_values: HashMap<&str, Option<&str>> = HashMap::new();
        for op in &batch.ops {
            let value = match op {
                WriteOp::Put { value, .. } => Some(value.as_str()),
                WriteOp::Delete { .. } => None,
            };
            final_values.insert(op.key(), value);
        }

        let current = self.backend.size_bytes().await?;
        let mut removed = 0usize;
        let mut added = 0usize;
        for (key, value) in final_values {
            if let Some(old) = self.backend.get(key).await? {
                removed += key.len() + old.len();
            }
            if let Some(new) = value {
                added += key.len() + new.len();
            }
        }

        let projected = (current + added).saturating_sub(removed);
        if projected > quota && projected > current {
            tracing::warn!(projected, quota, "Rejecting write over storage quota");
            return Err(AppError::QuotaExceeded {
                needed: projected,
                quota,
            });
        }
        Ok(())
    }
}
