//! Per-user data store.
//!
//! Every user's records live under their own key namespace, `wrh_user_{userId}_{record}`.
//! A single registry record lists all initialized users.

mod registry;
mod social;
mod user_database;

pub use user_database::*;

use crate::errors::AppError;

/// Prefix of every per-user key.
pub const USER_PREFIX: &str = "wrh_user_";

/// Key of the global registry record.
pub const GLOBAL_KEY: &str = "wrh_global_data";

/// Key of the signed-in user snapshot.
pub const CURRENT_USER_KEY: &str = "wrh_current_user";

/// Activity entries included in a dashboard.
pub const RECENT_ACTIVITY: usize = 10;

const MAX_USER_ID_LEN: usize = 128;

/// The record types stored per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Profile,
    Stories,
    Bookmarks,
    Likes,
    Comments,
    Following,
    Activity,
}

impl Record {
    pub const ALL: [Record; 7] = [
        Record::Profile,
        Record::Stories,
        Record::Bookmarks,
        Record::Likes,
        Record::Comments,
        Record::Following,
        Record::Activity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Record::Profile => "profile",
            Record::Stories => "stories",
            Record::Bookmarks => "bookmarks",
            Record::Likes => "likes",
            Record::Comments => "comments",
            Record::Following => "following",
            Record::Activity => "activity",
        }
    }
}

/// Storage key of one user's record.
pub fn user_key(user_id: &str, record: Record) -> String {
    format!("{}{}_{}", USER_PREFIX, user_id, record.as_str())
}

/// Reject ids that cannot be embedded in a key.
pub fn validate_user_id(user_id: &str) -> Result<(), AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::Validation("User id is required".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(AppError::Validation(format!(
            "User id must be at most {} bytes",
            MAX_USER_ID_LEN
        )));
    }
    if user_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::Validation(
            "User id must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}
