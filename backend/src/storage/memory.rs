//! In-process key-value backend.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, WriteOp};
use crate::errors::AppError;

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, String>,
    revision: i64,
}

/// Volatile store backed by a `HashMap`, used for tests and `WRH_STORAGE=memory`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.inner.read().await.entries.get(key).cloned())
    }

    async fn write_batch(&self, ops: Vec<WriteOp>) -> Result<(), AppError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    inner.entries.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    inner.entries.remove(&key);
                }
            }
        }
        inner.revision += 1;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let inner = self.inner.read().await;
        let mut keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn size_bytes(&self) -> Result<usize, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.entries.iter().map(|(k, v)| k.len() + v.len()).sum())
    }

    async fn revision(&self) -> Result<i64, AppError> {
        Ok(self.inner.read().await.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
        assert_eq!(store.revision().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_applies_in_order_and_bumps_revision_once() {
        let store = MemoryStore::new();
        store
            .write_batch(vec![
                WriteOp::Put {
                    key: "a".into(),
                    value: "1".into(),
                },
                WriteOp::Put {
                    key: "b".into(),
                    value: "2".into(),
                },
                WriteOp::Delete { key: "a".into() },
            ])
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.revision().await.unwrap(), 1);
        assert_eq!(store.size_bytes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_keys_filters_by_prefix() {
        let store = MemoryStore::new();
        store.set("wrh_user_b_profile", "{}".into()).await.unwrap();
        store.set("wrh_user_a_profile", "{}".into()).await.unwrap();
        store.set("wrh_global_data", "{}".into()).await.unwrap();

        let keys = store.keys("wrh_user_").await.unwrap();
        assert_eq!(keys, vec!["wrh_user_a_profile", "wrh_user_b_profile"]);

        store.remove("wrh_user_a_profile").await.unwrap();
        assert_eq!(store.keys("wrh_user_").await.unwrap().len(), 1);
    }
}
