//! Actions accepted by the session reducer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Comment, SessionUser, Story, StoryUpdate};

/// A state transition request, as sent by clients:
/// `{"type": "LIKE_STORY", "payload": "story-id"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Sign in, or sign out with `null`.
    SetUser(Option<SessionUser>),
    AddStory(Story),
    UpdateStory(StoryPatch),
    DeleteStory(String),
    LikeStory(String),
    BookmarkStory(String),
    AddComment(Comment),
    LikeComment(String),
    FollowUser(String),
    UnfollowUser(String),
    /// Viewer sets. Always refilled from the store before reducing, so `{}` is a valid payload.
    LoadUserData(ViewerSets),
    LoadData(Catalogue),
}

impl Action {
    /// Actions that act on behalf of the signed-in user.
    pub fn requires_user(&self) -> bool {
        matches!(
            self,
            Action::AddStory(_)
                | Action::UpdateStory(_)
                | Action::DeleteStory(_)
                | Action::LikeStory(_)
                | Action::BookmarkStory(_)
                | Action::AddComment(_)
                | Action::LikeComment(_)
                | Action::FollowUser(_)
                | Action::UnfollowUser(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::SetUser(_) => "SET_USER",
            Action::AddStory(_) => "ADD_STORY",
            Action::UpdateStory(_) => "UPDATE_STORY",
            Action::DeleteStory(_) => "DELETE_STORY",
            Action::LikeStory(_) => "LIKE_STORY",
            Action::BookmarkStory(_) => "BOOKMARK_STORY",
            Action::AddComment(_) => "ADD_COMMENT",
            Action::LikeComment(_) => "LIKE_COMMENT",
            Action::FollowUser(_) => "FOLLOW_USER",
            Action::UnfollowUser(_) => "UNFOLLOW_USER",
            Action::LoadUserData(_) => "LOAD_USER_DATA",
            Action::LoadData(_) => "LOAD_DATA",
        }
    }
}

/// Partial edit of one story. `at` stamps `updatedAt` so reducing stays deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPatch {
    pub id: String,
    #[serde(flatten)]
    pub changes: StoryUpdate,
    #[serde(default = "Utc::now")]
    pub at: DateTime<Utc>,
}

/// The signed-in user's authoritative like and bookmark sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerSets {
    pub liked_stories: Vec<String>,
    pub bookmarked_stories: Vec<String>,
}

/// Shared records a session starts from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Catalogue {
    pub stories: Vec<Story>,
    pub comments: Vec<Comment>,
    pub user: Option<SessionUser>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let action: Action =
            serde_json::from_str(r#"{"type":"LIKE_STORY","payload":"s1"}"#).unwrap();
        assert!(matches!(&action, Action::LikeStory(id) if id == "s1"));
        assert!(action.requires_user());

        let logout: Action = serde_json::from_str(r#"{"type":"SET_USER","payload":null}"#).unwrap();
        assert!(matches!(logout, Action::SetUser(None)));

        let value = serde_json::to_value(Action::FollowUser("u2".into())).unwrap();
        assert_eq!(value["type"], "FOLLOW_USER");
        assert_eq!(value["payload"], "u2");
    }

    #[test]
    fn test_update_story_payload_flattens_changes() {
        let action: Action = serde_json::from_str(
            r#"{"type":"UPDATE_STORY","payload":{"id":"s1","title":"New","status":"published"}}"#,
        )
        .unwrap();
        let Action::UpdateStory(patch) = action else {
            panic!("expected UPDATE_STORY");
        };
        assert_eq!(patch.id, "s1");
        assert_eq!(patch.changes.title.as_deref(), Some("New"));
        assert!(patch.changes.content.is_none());
    }

    #[test]
    fn test_add_story_payload_gets_defaults() {
        let action: Action =
            serde_json::from_str(r#"{"type":"ADD_STORY","payload":{"title":"Hello"}}"#).unwrap();
        let Action::AddStory(story) = action else {
            panic!("expected ADD_STORY");
        };
        assert!(!story.id.is_empty());
        assert!(story.author_id.is_empty());
        assert_eq!(Action::AddStory(story).name(), "ADD_STORY");
    }
}
