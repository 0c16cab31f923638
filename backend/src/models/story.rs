//! Story model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

/// Characters kept in a generated excerpt.
pub const EXCERPT_CHARS: usize = 150;

/// Reading speed used for `readTime`.
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    #[default]
    Draft,
    Published,
}

/// A story or post written by one user.
///
/// `status` is `Published` exactly when `published_at` is set; [`Story::normalize`] restores that
/// after any hand edit, and every write path goes through it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(default = "new_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: StoryStatus,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub read_time: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Story {
    /// Build a stored story from a creation payload.
    pub fn compose(author_id: &str, new: &NewStory, now: DateTime<Utc>) -> Self {
        let status = new.status.unwrap_or_default();
        let mut story = Self {
            id: new.id.clone().unwrap_or_else(new_id),
            title: new.title.trim().to_string(),
            content: new.content.clone(),
            excerpt: new.excerpt.clone().unwrap_or_default(),
            author_id: author_id.to_string(),
            author_name: new.author_name.clone(),
            category: new.category.clone(),
            tags: new.tags.clone(),
            published_at: (status == StoryStatus::Published).then_some(now),
            status,
            likes: 0,
            comments: 0,
            views: 0,
            read_time: 0,
            created_at: now,
            updated_at: now,
        };
        story.normalize();
        story
    }

    /// Recompute derived fields and repair the status/publish-date pairing.
    pub fn normalize(&mut self) {
        match self.status {
            StoryStatus::Published if self.published_at.is_none() => {
                self.published_at = Some(self.updated_at);
            }
            StoryStatus::Draft => self.published_at = None,
            StoryStatus::Published => {}
        }
        if self.excerpt.trim().is_empty() {
            self.excerpt = excerpt_of(&self.content);
        }
        self.read_time = read_time_minutes(&self.content);
    }

    /// Apply a partial edit. A content change without an explicit excerpt regenerates it.
    pub fn apply(&mut self, update: &StoryUpdate, now: DateTime<Utc>) {
        if let Some(title) = &update.title {
            self.title = title.trim().to_string();
        }
        if let Some(content) = &update.content {
            self.content = content.clone();
            if update.excerpt.is_none() {
                self.excerpt = excerpt_of(content);
            }
        }
        if let Some(excerpt) = &update.excerpt {
            self.excerpt = excerpt.clone();
        }
        if let Some(category) = &update.category {
            self.category = category.clone();
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(status) = update.status {
            match status {
                StoryStatus::Published if self.published_at.is_none() => {
                    self.published_at = Some(now)
                }
                StoryStatus::Draft => self.published_at = None,
                StoryStatus::Published => {}
            }
            self.status = status;
        }
        self.updated_at = now;
        self.normalize();
    }

    pub fn is_published(&self) -> bool {
        self.status == StoryStatus::Published
    }
}

/// Creation payload for a story. A missing `id` gets a fresh UUID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStory {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<StoryStatus>,
}

impl From<&Story> for NewStory {
    fn from(story: &Story) -> Self {
        Self {
            id: Some(story.id.clone()),
            title: story.title.clone(),
            content: story.content.clone(),
            excerpt: Some(story.excerpt.clone()),
            author_name: story.author_name.clone(),
            category: story.category.clone(),
            tags: story.tags.clone(),
            status: Some(story.status),
        }
    }
}

/// Partial story edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<StoryStatus>,
}

/// A story as seen by one viewer. Never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryView {
    #[serde(flatten)]
    pub story: Story,
    pub is_liked: bool,
    pub is_bookmarked: bool,
}

/// First [`EXCERPT_CHARS`] characters of `content`, with an ellipsis when cut.
pub fn excerpt_of(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// Whole minutes to read `content`, never less than one.
pub fn read_time_minutes(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}
