//! Composite read models: dashboard and data export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActivityEntry, Comment, Story, UserProfile};

/// Totals over one author's stories.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoryAnalytics {
    pub published: u64,
    pub drafts: u64,
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
}

impl StoryAnalytics {
    pub fn from_stories(stories: &[Story]) -> Self {
        stories.iter().fold(Self::default(), |mut acc, story| {
            if story.is_published() {
                acc.published += 1;
            } else {
                acc.drafts += 1;
            }
            acc.total_views += story.views;
            acc.total_likes += story.likes;
            acc.total_comments += story.comments;
            acc
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub user_id: String,
    pub profile: Option<UserProfile>,
    pub stories: Vec<Story>,
    pub recent_activity: Vec<ActivityEntry>,
    pub bookmarks: Vec<String>,
    pub analytics: StoryAnalytics,
}

/// Everything stored for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExport {
    pub user_id: String,
    pub profile: Option<UserProfile>,
    pub stories: Vec<Story>,
    pub bookmarks: Vec<String>,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    pub following: Vec<String>,
    pub activity: Vec<ActivityEntry>,
    pub exported_at: DateTime<Utc>,
}
