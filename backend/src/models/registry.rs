//! Global registry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Singleton list of every initialized user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalData {
    pub users: Vec<String>,
    pub total_users: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl GlobalData {
    /// Add `user_id` if absent. Returns whether the list changed.
    pub fn register(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        if self.users.iter().any(|u| u == user_id) {
            return false;
        }
        self.users.push(user_id.to_string());
        self.total_users = self.users.len();
        self.updated_at = Some(now);
        true
    }

    /// Drop `user_id` if present. Returns whether the list changed.
    pub fn unregister(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u != user_id);
        if self.users.len() == before {
            return false;
        }
        self.total_users = self.users.len();
        self.updated_at = Some(now);
        true
    }
}
