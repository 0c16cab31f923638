//! Comment model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default = "new_id")]
    pub id: String,
    pub story_id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
}

impl Comment {
    pub fn compose(author_id: &str, new: &NewComment, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id.clone().unwrap_or_else(new_id),
            story_id: new.story_id.clone(),
            author_id: author_id.to_string(),
            author_name: new.author_name.clone(),
            content: new.content.trim().to_string(),
            created_at: now,
            likes: 0,
        }
    }
}

/// Creation payload for a comment.
///
/// When `story_author_id` is given, the parent story's stored counter is bumped with the comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(default)]
    pub id: Option<String>,
    pub story_id: String,
    pub content: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub story_author_id: Option<String>,
}

/// A comment as seen by one viewer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub is_liked: bool,
}
