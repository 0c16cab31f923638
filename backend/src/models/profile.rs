//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UI colour scheme preference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Who can see a user's profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyMode {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_notifications")]
    pub notifications: bool,
    #[serde(default)]
    pub privacy: PrivacyMode,
}

fn default_notifications() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            notifications: default_notifications(),
            privacy: PrivacyMode::default(),
        }
    }
}

/// Cached per-user counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub stories_published: u64,
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
    pub followers: u64,
    pub following: u64,
}

/// A registered hub user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub stats: UserStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Build a fresh profile with default settings and zeroed stats.
    pub fn new(id: &str, seed: &NewUser, now: DateTime<Utc>) -> Self {
        let name = if seed.name.trim().is_empty() {
            id.to_string()
        } else {
            seed.name.trim().to_string()
        };

        Self {
            id: id.to_string(),
            name,
            email: seed.email.clone(),
            bio: seed.bio.clone(),
            avatar: seed.avatar.clone(),
            settings: UserSettings::default(),
            stats: UserStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge `update` into the profile. Unset fields keep their value.
    pub fn apply(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
        if let Some(bio) = &update.bio {
            self.bio = bio.clone();
        }
        if let Some(avatar) = &update.avatar {
            self.avatar = Some(avatar.clone());
        }
        if let Some(settings) = &update.settings {
            if let Some(theme) = settings.theme {
                self.settings.theme = theme;
            }
            if let Some(notifications) = settings.notifications {
                self.settings.notifications = notifications;
            }
            if let Some(privacy) = settings.privacy {
                self.settings.privacy = privacy;
            }
        }
        self.updated_at = now;
    }
}

/// Seed data for [`UserProfile::new`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub bio: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub theme: Option<Theme>,
    pub notifications: Option<bool>,
    pub privacy: Option<PrivacyMode>,
}

/// Partial profile edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub settings: Option<SettingsUpdate>,
}

impl ProfileUpdate {
    /// Names of the fields this update touches, for the activity log.
    pub fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name".to_string());
        }
        if self.email.is_some() {
            fields.push("email".to_string());
        }
        if self.bio.is_some() {
            fields.push("bio".to_string());
        }
        if self.avatar.is_some() {
            fields.push("avatar".to_string());
        }
        if self.settings.is_some() {
            fields.push("settings".to_string());
        }
        fields
    }
}

/// Snapshot of the signed-in user kept under the current-session key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl SessionUser {
    pub fn seed(&self) -> NewUser {
        NewUser {
            name: self.name.clone(),
            email: self.email.clone(),
            ..NewUser::default()
        }
    }
}
