use chrono::Utc;

use super::{user_key, validate_user_id, Record, UserDatabase, GLOBAL_KEY, USER_PREFIX};
use crate::errors::AppError;
use crate::models::GlobalData;

impl UserDatabase {
    pub(super) async fn read_global(&self) -> Result<GlobalData, AppError> {
        Ok(self.storage.get(GLOBAL_KEY).await?.unwrap_or_default())
    }

    /// The registry of initialized users. Empty when nothing is stored yet.
    pub async fn get_global_data(&self) -> Result<GlobalData, AppError> {
        self.read_global().await
    }

    /// Register `user_id` if it is not listed yet.
    pub async fn update_global_user_list(&self, user_id: &str) -> Result<GlobalData, AppError> {
        validate_user_id(user_id)?;
        let _guard = self.write_lock.lock().await;
        let mut registry = self.read_global().await?;
        if registry.register(user_id, Utc::now()) {
            self.storage.set(GLOBAL_KEY, &registry).await?;
        }
        Ok(registry)
    }

    pub async fn remove_from_global_user_list(
        &self,
        user_id: &str,
    ) -> Result<GlobalData, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut registry = self.read_global().await?;
        if registry.unregister(user_id, Utc::now()) {
            self.storage.set(GLOBAL_KEY, &registry).await?;
        }
        Ok(registry)
    }
}

impl UserDatabase {
    async fn has_records(&self, user_id: &str) -> Result<bool, AppError> {
        for record in Record::ALL {
            let value: Option<serde_json::Value> =
                self.storage.get(&user_key(user_id, record)).await?;
            if value.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Bring the registry in line with stored data: every stored profile is listed, and listed
    /// users without any record are dropped.
    pub async fn reconcile_registry(&self) -> Result<GlobalData, AppError> {
        let suffix = format!("_{}", Record::Profile.as_str());
        let keys = self.storage.keys(USER_PREFIX).await?;
        let with_profile: Vec<&str> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(USER_PREFIX)?.strip_suffix(&suffix))
            .filter(|id| validate_user_id(id).is_ok())
            .collect();

        let before = self.read_global().await?;
        for user_id in &with_profile {
            self.update_global_user_list(user_id).await?;
        }
        for user_id in &before.users {
            if !self.has_records(user_id).await? {
                self.remove_from_global_user_list(user_id).await?;
            }
        }

        let after = self.read_global().await?;
        if after.users != before.users {
            tracing::info!(
                before = before.total_users,
                after = after.total_users,
                "Reconciled user registry"
            );
        }
        Ok(after)
    }
}
