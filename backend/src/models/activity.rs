//! Activity log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

/// Entries kept per user; older ones are evicted.
pub const ACTIVITY_LOG_CAP: usize = 100;

/// What happened, with only the fields relevant to that kind of event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActivityKind {
    StoryCreated { story_id: String, title: String },
    StoryUpdated { story_id: String, title: String },
    StoryDeleted { story_id: String },
    StoryLiked { story_id: String },
    StoryUnliked { story_id: String },
    StoryBookmarked { story_id: String },
    StoryUnbookmarked { story_id: String },
    CommentAdded { comment_id: String, story_id: String },
    UserFollowed { target_id: String },
    UserUnfollowed { target_id: String },
    ProfileUpdated { fields: Vec<String> },
    UserLogin,
}

impl ActivityKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ActivityKind::StoryCreated { .. } => "story_created",
            ActivityKind::StoryUpdated { .. } => "story_updated",
            ActivityKind::StoryDeleted { .. } => "story_deleted",
            ActivityKind::StoryLiked { .. } => "story_liked",
            ActivityKind::StoryUnliked { .. } => "story_unliked",
            ActivityKind::StoryBookmarked { .. } => "story_bookmarked",
            ActivityKind::StoryUnbookmarked { .. } => "story_unbookmarked",
            ActivityKind::CommentAdded { .. } => "comment_added",
            ActivityKind::UserFollowed { .. } => "user_followed",
            ActivityKind::UserUnfollowed { .. } => "user_unfollowed",
            ActivityKind::ProfileUpdated { .. } => "profile_updated",
            ActivityKind::UserLogin => "user_login",
        }
    }

    /// The liked/unliked variant for a toggle outcome.
    pub fn like(story_id: &str, liked: bool) -> Self {
        let story_id = story_id.to_string();
        if liked {
            ActivityKind::StoryLiked { story_id }
        } else {
            ActivityKind::StoryUnliked { story_id }
        }
    }

    /// The bookmarked/unbookmarked variant for a toggle outcome.
    pub fn bookmark(story_id: &str, bookmarked: bool) -> Self {
        let story_id = story_id.to_string();
        if bookmarked {
            ActivityKind::StoryBookmarked { story_id }
        } else {
            ActivityKind::StoryUnbookmarked { story_id }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

impl ActivityEntry {
    pub fn new(kind: ActivityKind, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            timestamp: now,
            kind,
        }
    }
}
