//! Profile, story, engagement and activity records.
//!
//! Every mutation runs under one write lock so read-modify-write sequences cannot interleave, and
//! writes touching several keys go through a single atomic [`Batch`].

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use super::{user_key, validate_user_id, Record, CURRENT_USER_KEY, GLOBAL_KEY, RECENT_ACTIVITY};
use crate::errors::AppError;
use crate::models::{
    ActivityEntry, ActivityKind, Comment, DashboardData, NewComment, NewStory, NewUser,
    ProfileUpdate, SessionUser, Story, StoryAnalytics, StoryUpdate, UserExport, UserProfile,
    UserStats, ACTIVITY_LOG_CAP,
};
use crate::storage::{Batch, JsonStorage};

/// Data access for all per-user records.
pub struct UserDatabase {
    pub(super) storage: JsonStorage,
    pub(super) write_lock: Mutex<()>,
}

impl UserDatabase {
    pub fn new(storage: JsonStorage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        use crate::storage::MemoryStore;
        Self::new(JsonStorage::new(std::sync::Arc::new(MemoryStore::new())))
    }

    /// Revision of the underlying store, bumped on every applied write.
    pub async fn revision(&self) -> Result<i64, AppError> {
        self.storage.revision().await
    }

    pub(super) async fn read_list<T: DeserializeOwned>(
        &self,
        user_id: &str,
        record: Record,
    ) -> Result<Vec<T>, AppError> {
        Ok(self
            .storage
            .get(&user_key(user_id, record))
            .await?
            .unwrap_or_default())
    }

    /// Stage a change to the author's stored copy of a story. Returns the changed story, or `None`
    /// when the author has no such story.
    ///
    /// Reads come from the store, not from `batch`; callers must not stage the same key twice.
    pub(super) async fn stage_story_change<F>(
        &self,
        batch: &mut Batch,
        author_id: &str,
        story_id: &str,
        change: F,
    ) -> Result<Option<Story>, AppError>
    where
        F: FnOnce(&mut Story),
    {
        let mut stories: Vec<Story> = self.read_list(author_id, Record::Stories).await?;
        let Some(story) = stories.iter_mut().find(|s| s.id == story_id) else {
            return Ok(None);
        };
        change(story);
        let changed = story.clone();
        batch.put(user_key(author_id, Record::Stories), &stories)?;
        Ok(Some(changed))
    }

    /// Stage a change to a user's cached stats. Users without a profile are left alone.
    pub(super) async fn stage_stats_change<F>(
        &self,
        batch: &mut Batch,
        user_id: &str,
        change: F,
    ) -> Result<bool, AppError>
    where
        F: FnOnce(&mut UserStats),
    {
        let Some(mut profile) = self.get_user_profile(user_id).await? else {
            return Ok(false);
        };
        change(&mut profile.stats);
        batch.put(user_key(user_id, Record::Profile), &profile)?;
        Ok(true)
    }

    // ==================== PROFILE OPERATIONS ====================

    pub async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.storage.get(&user_key(user_id, Record::Profile)).await
    }

    /// Create the profile if absent and register the user. An existing profile is returned as is.
    pub async fn initialize_user(
        &self,
        user_id: &str,
        seed: &NewUser,
    ) -> Result<UserProfile, AppError> {
        validate_user_id(user_id)?;
        let _guard = self.write_lock.lock().await;

        let now = Utc::now();
        let mut registry = self.read_global().await?;

        if let Some(existing) = self.get_user_profile(user_id).await? {
            if registry.register(user_id, now) {
                self.storage.set(GLOBAL_KEY, &registry).await?;
            }
            return Ok(existing);
        }

        let profile = UserProfile::new(user_id, seed, now);
        registry.register(user_id, now);

        let mut batch = Batch::new();
        batch.put(user_key(user_id, Record::Profile), &profile)?;
        batch.put(GLOBAL_KEY, &registry)?;
        self.storage.apply(batch).await?;

        tracing::info!(user_id, total_users = registry.total_users, "Initialized user");
        Ok(profile)
    }

    pub async fn update_user_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, AppError> {
        if matches!(&update.name, Some(name) if name.trim().is_empty()) {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut profile = self
            .get_user_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        profile.apply(update, Utc::now());
        self.storage
            .set(&user_key(user_id, Record::Profile), &profile)
            .await?;
        Ok(profile)
    }

    // ==================== STORY OPERATIONS ====================

    pub async fn get_user_stories(&self, user_id: &str) -> Result<Vec<Story>, AppError> {
        self.read_list(user_id, Record::Stories).await
    }

    pub async fn get_user_story(
        &self,
        user_id: &str,
        story_id: &str,
    ) -> Result<Option<Story>, AppError> {
        let stories = self.get_user_stories(user_id).await?;
        Ok(stories.into_iter().find(|s| s.id == story_id))
    }

    /// Append a story. `storiesPublished` becomes the number of stored stories, drafts included.
    pub async fn add_user_story(&self, user_id: &str, new: &NewStory) -> Result<Story, AppError> {
        validate_user_id(user_id)?;
        if new.title.trim().is_empty() {
            return Err(AppError::Validation("Story title is required".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut stories = self.get_user_stories(user_id).await?;
        if let Some(id) = &new.id {
            if stories.iter().any(|s| &s.id == id) {
                return Err(AppError::Validation(format!("Story {} already exists", id)));
            }
        }

        let story = Story::compose(user_id, new, Utc::now());
        stories.push(story.clone());

        let mut batch = Batch::new();
        batch.put(user_key(user_id, Record::Stories), &stories)?;
        let count = stories.len() as u64;
        self.stage_stats_change(&mut batch, user_id, |stats| {
            stats.stories_published = count
        })
        .await?;
        self.storage.apply(batch).await?;

        tracing::debug!(user_id, story_id = %story.id, "Added story");
        Ok(story)
    }

    pub async fn update_user_story(
        &self,
        user_id: &str,
        story_id: &str,
        update: &StoryUpdate,
    ) -> Result<Story, AppError> {
        if matches!(&update.title, Some(title) if title.trim().is_empty()) {
            return Err(AppError::Validation("Story title is required".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut batch = Batch::new();
        let now = Utc::now();
        let story = self
            .stage_story_change(&mut batch, user_id, story_id, |story| {
                story.apply(update, now)
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Story {} not found", story_id)))?;
        self.storage.apply(batch).await?;
        Ok(story)
    }

    /// Remove a story and return it.
    pub async fn delete_user_story(&self, user_id: &str, story_id: &str) -> Result<Story, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut stories = self.get_user_stories(user_id).await?;
        let index = stories
            .iter()
            .position(|s| s.id == story_id)
            .ok_or_else(|| AppError::NotFound(format!("Story {} not found", story_id)))?;
        let removed = stories.remove(index);

        let mut batch = Batch::new();
        batch.put(user_key(user_id, Record::Stories), &stories)?;
        let count = stories.len() as u64;
        self.stage_stats_change(&mut batch, user_id, |stats| {
            stats.stories_published = count
        })
        .await?;
        self.storage.apply(batch).await?;

        tracing::debug!(user_id, story_id, "Deleted story");
        Ok(removed)
    }

    /// Count a view on an author's story. Returns the new view count.
    pub async fn record_story_view(&self, author_id: &str, story_id: &str) -> Result<u64, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut batch = Batch::new();
        let story = self
            .stage_story_change(&mut batch, author_id, story_id, |story| story.views += 1)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Story {} not found", story_id)))?;
        self.stage_stats_change(&mut batch, author_id, |stats| stats.total_views += 1)
            .await?;
        self.storage.apply(batch).await?;
        Ok(story.views)
    }

    /// Stories of every registered user.
    pub async fn all_stories(&self) -> Result<Vec<Story>, AppError> {
        let registry = self.get_global_data().await?;
        let mut all = Vec::new();
        for user_id in &registry.users {
            all.extend(self.get_user_stories(user_id).await?);
        }
        Ok(all)
    }

    // ==================== BOOKMARK OPERATIONS ====================

    pub async fn get_user_bookmarks(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        self.read_list(user_id, Record::Bookmarks).await
    }

    /// Returns whether the bookmark set changed.
    pub async fn add_bookmark(&self, user_id: &str, story_id: &str) -> Result<bool, AppError> {
        validate_user_id(user_id)?;
        let _guard = self.write_lock.lock().await;
        let mut bookmarks = self.get_user_bookmarks(user_id).await?;
        if bookmarks.iter().any(|b| b == story_id) {
            return Ok(false);
        }
        bookmarks.push(story_id.to_string());
        self.storage
            .set(&user_key(user_id, Record::Bookmarks), &bookmarks)
            .await?;
        Ok(true)
    }

    /// Returns whether the bookmark set changed.
    pub async fn remove_bookmark(&self, user_id: &str, story_id: &str) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut bookmarks = self.get_user_bookmarks(user_id).await?;
        let before = bookmarks.len();
        bookmarks.retain(|b| b != story_id);
        if bookmarks.len() == before {
            return Ok(false);
        }
        self.storage
            .set(&user_key(user_id, Record::Bookmarks), &bookmarks)
            .await?;
        Ok(true)
    }

    /// Flip membership of `story_id` in the user's bookmark set. Returns the new bookmarked state.
    pub async fn toggle_bookmark(&self, user_id: &str, story_id: &str) -> Result<bool, AppError> {
        validate_user_id(user_id)?;
        let _guard = self.write_lock.lock().await;
        let mut bookmarks = self.get_user_bookmarks(user_id).await?;
        let bookmarked = match bookmarks.iter().position(|b| b == story_id) {
            Some(index) => {
                bookmarks.remove(index);
                false
            }
            None => {
                bookmarks.push(story_id.to_string());
                true
            }
        };
        self.storage
            .set(&user_key(user_id, Record::Bookmarks), &bookmarks)
            .await?;
        Ok(bookmarked)
    }

    // ==================== LIKE OPERATIONS ====================

    pub async fn get_user_likes(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        self.read_list(user_id, Record::Likes).await
    }

    /// Flip membership of `story_id` in the user's like set. Returns the new liked state.
    pub async fn toggle_like(&self, user_id: &str, story_id: &str) -> Result<bool, AppError> {
        self.toggle_like_inner(user_id, None, story_id).await
    }

    /// Like [`toggle_like`](Self::toggle_like), and in the same batch adjust the author's stored
    /// story `likes` and the author's `totalLikes`.
    pub async fn toggle_like_on(
        &self,
        user_id: &str,
        author_id: &str,
        story_id: &str,
    ) -> Result<bool, AppError> {
        self.toggle_like_inner(user_id, Some(author_id), story_id)
            .await
    }

    async fn toggle_like_inner(
        &self,
        user_id: &str,
        author_id: Option<&str>,
        story_id: &str,
    ) -> Result<bool, AppError> {
        validate_user_id(user_id)?;
        let _guard = self.write_lock.lock().await;

        let mut likes = self.get_user_likes(user_id).await?;
        let liked = match likes.iter().position(|l| l == story_id) {
            Some(index) => {
                likes.remove(index);
                false
            }
            None => {
                likes.push(story_id.to_string());
                true
            }
        };

        let mut batch = Batch::new();
        batch.put(user_key(user_id, Record::Likes), &likes)?;

        if let Some(author_id) = author_id {
            let adjust = |count: &mut u64| {
                *count = if liked {
                    *count + 1
                } else {
                    count.saturating_sub(1)
                }
            };
            let found = self
                .stage_story_change(&mut batch, author_id, story_id, |story| {
                    adjust(&mut story.likes)
                })
                .await?;
            if found.is_some() && author_id != user_id {
                self.stage_stats_change(&mut batch, author_id, |stats| {
                    adjust(&mut stats.total_likes)
                })
                .await?;
            }
        }

        self.storage.apply(batch).await?;
        tracing::debug!(user_id, story_id, liked, "Toggled like");
        Ok(liked)
    }

    // ==================== COMMENT OPERATIONS ====================

    pub async fn get_user_comments(&self, user_id: &str) -> Result<Vec<Comment>, AppError> {
        self.read_list(user_id, Record::Comments).await
    }

    /// Append a comment written by `user_id`.
    pub async fn add_user_comment(
        &self,
        user_id: &str,
        new: &NewComment,
    ) -> Result<Comment, AppError> {
        validate_user_id(user_id)?;
        if new.content.trim().is_empty() {
            return Err(AppError::Validation(
                "Comment content is required".to_string(),
            ));
        }
        if new.story_id.trim().is_empty() {
            return Err(AppError::Validation("Story id is required".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut comments = self.get_user_comments(user_id).await?;
        let comment = Comment::compose(user_id, new, Utc::now());
        comments.push(comment.clone());

        let mut batch = Batch::new();
        batch.put(user_key(user_id, Record::Comments), &comments)?;

        if let Some(author_id) = new.story_author_id.as_deref() {
            let found = self
                .stage_story_change(&mut batch, author_id, &new.story_id, |story| {
                    story.comments += 1
                })
                .await?;
            if found.is_some() && author_id != user_id {
                self.stage_stats_change(&mut batch, author_id, |stats| stats.total_comments += 1)
                    .await?;
            }
        }

        self.storage.apply(batch).await?;
        Ok(comment)
    }

    // ==================== ACTIVITY OPERATIONS ====================

    /// Most recent first.
    pub async fn get_user_activity(&self, user_id: &str) -> Result<Vec<ActivityEntry>, AppError> {
        self.read_list(user_id, Record::Activity).await
    }

    /// Prepend an entry, keeping at most [`ACTIVITY_LOG_CAP`] entries.
    pub async fn log_activity(
        &self,
        user_id: &str,
        kind: ActivityKind,
    ) -> Result<ActivityEntry, AppError> {
        validate_user_id(user_id)?;
        let _guard = self.write_lock.lock().await;

        let mut activity = self.get_user_activity(user_id).await?;
        let entry = ActivityEntry::new(kind, Utc::now());
        activity.insert(0, entry.clone());
        activity.truncate(ACTIVITY_LOG_CAP);

        self.storage
            .set(&user_key(user_id, Record::Activity), &activity)
            .await?;
        tracing::debug!(user_id, kind = entry.kind.type_tag(), "Logged activity");
        Ok(entry)
    }

    // ==================== COMPOSITE OPERATIONS ====================

    pub async fn get_user_dashboard_data(&self, user_id: &str) -> Result<DashboardData, AppError> {
        let profile = self.get_user_profile(user_id).await?;
        let stories = self.get_user_stories(user_id).await?;
        let mut recent_activity = self.get_user_activity(user_id).await?;
        recent_activity.truncate(RECENT_ACTIVITY);
        let bookmarks = self.get_user_bookmarks(user_id).await?;
        let analytics = StoryAnalytics::from_stories(&stories);

        Ok(DashboardData {
            user_id: user_id.to_string(),
            profile,
            stories,
            recent_activity,
            bookmarks,
            analytics,
        })
    }

    pub async fn export_user_data(&self, user_id: &str) -> Result<UserExport, AppError> {
        Ok(UserExport {
            user_id: user_id.to_string(),
            profile: self.get_user_profile(user_id).await?,
            stories: self.get_user_stories(user_id).await?,
            bookmarks: self.get_user_bookmarks(user_id).await?,
            likes: self.get_user_likes(user_id).await?,
            comments: self.get_user_comments(user_id).await?,
            following: self.get_user_following(user_id).await?,
            activity: self.get_user_activity(user_id).await?,
            exported_at: Utc::now(),
        })
    }

    /// Erase every record of the user and drop them from the registry. Irreversible.
    ///
    /// Both sides of the follow graph are unwound in the same batch: users they followed lose a
    /// follower, and users following them drop them from their lists.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        let mut batch = Batch::new();
        for target_id in self.get_user_following(user_id).await? {
            if target_id == user_id {
                continue;
            }
            self.stage_stats_change(&mut batch, &target_id, |stats| {
                stats.followers = stats.followers.saturating_sub(1)
            })
            .await?;
        }
        for follower_id in self.get_followers(user_id).await? {
            let mut following = self.get_user_following(&follower_id).await?;
            following.retain(|f| f != user_id);
            batch.put(user_key(&follower_id, Record::Following), &following)?;
            let count = following.len() as u64;
            self.stage_stats_change(&mut batch, &follower_id, |stats| stats.following = count)
                .await?;
        }

        for record in Record::ALL {
            batch.delete(user_key(user_id, record));
        }

        let mut registry = self.read_global().await?;
        if registry.unregister(user_id, Utc::now()) {
            batch.put(GLOBAL_KEY, &registry)?;
        }

        let current: Option<SessionUser> = self.storage.get(CURRENT_USER_KEY).await?;
        if current.is_some_and(|u| u.id == user_id) {
            batch.delete(CURRENT_USER_KEY);
        }

        self.storage.apply(batch).await?;
        tracing::info!(user_id, "Deleted user data");
        Ok(())
    }

    // ==================== SESSION SNAPSHOT ====================

    pub async fn current_user(&self) -> Result<Option<SessionUser>, AppError> {
        self.storage.get(CURRENT_USER_KEY).await
    }

    /// Store or clear the signed-in user snapshot.
    pub async fn set_current_user(&self, user: Option<&SessionUser>) -> Result<(), AppError> {
        match user {
            Some(user) => self.storage.set(CURRENT_USER_KEY, user).await,
            None => self.storage.remove(CURRENT_USER_KEY).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::StoryStatus;
    use crate::storage::MemoryStore;

    fn seed(name: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            ..NewUser::default()
        }
    }

    fn story(title: &str) -> NewStory {
        NewStory {
            title: title.to_string(),
            content: "Once upon a time".to_string(),
            ..NewStory::default()
        }
    }

    #[tokio::test]
    async fn test_reads_on_unknown_user_are_empty() {
        let db = UserDatabase::in_memory();

        assert!(db.get_user_profile("ghost").await.unwrap().is_none());
        assert!(db.get_user_stories("ghost").await.unwrap().is_empty());
        assert!(db.get_user_bookmarks("ghost").await.unwrap().is_empty());
        assert!(db.get_user_likes("ghost").await.unwrap().is_empty());
        assert!(db.get_user_comments("ghost").await.unwrap().is_empty());
        assert!(db.get_user_activity("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_user_is_idempotent() {
        let db = UserDatabase::in_memory();

        let first = db.initialize_user("u1", &seed("Alex")).await.unwrap();
        db.add_user_story("u1", &story("Hello")).await.unwrap();
        let before = db.get_user_profile("u1").await.unwrap().unwrap();

        let second = db.initialize_user("u1", &seed("Someone Else")).await.unwrap();

        assert_eq!(second.name, "Alex");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.stats, before.stats);
        assert_eq!(second.stats.stories_published, 1);

        let registry = db.get_global_data().await.unwrap();
        assert_eq!(registry.users, vec!["u1"]);
        assert_eq!(registry.total_users, 1);
    }

    #[tokio::test]
    async fn test_update_profile_merges_and_requires_profile() {
        let db = UserDatabase::in_memory();
        db.initialize_user("u1", &seed("Alex")).await.unwrap();

        let updated = db
            .update_user_profile(
                "u1",
                &ProfileUpdate {
                    bio: Some("Poet".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Alex");
        assert_eq!(updated.bio, "Poet");
        assert!(updated.updated_at >= updated.created_at);

        let err = db
            .update_user_profile("ghost", &ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_toggle_like_symmetry() {
        let db = UserDatabase::in_memory();

        assert!(db.toggle_like("u1", "s1").await.unwrap());
        assert_eq!(db.get_user_likes("u1").await.unwrap(), vec!["s1"]);

        assert!(!db.toggle_like("u1", "s1").await.unwrap());
        assert!(db.get_user_likes("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_like_on_moves_story_and_author_counters_together() {
        let db = UserDatabase::in_memory();
        db.initialize_user("author", &seed("Author")).await.unwrap();
        let s = db.add_user_story("author", &story("Hello")).await.unwrap();

        assert!(db.toggle_like_on("reader", "author", &s.id).await.unwrap());
        let stored = db.get_user_story("author", &s.id).await.unwrap().unwrap();
        assert_eq!(stored.likes, 1);
        let author = db.get_user_profile("author").await.unwrap().unwrap();
        assert_eq!(author.stats.total_likes, 1);

        assert!(!db.toggle_like_on("reader", "author", &s.id).await.unwrap());
        let stored = db.get_user_story("author", &s.id).await.unwrap().unwrap();
        assert_eq!(stored.likes, 0);
        let author = db.get_user_profile("author").await.unwrap().unwrap();
        assert_eq!(author.stats.total_likes, 0);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_do_not_lose_updates() {
        let db = Arc::new(UserDatabase::in_memory());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.toggle_like("u1", "s1").await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // An even number of serialized toggles ends unliked
        assert!(db.get_user_likes("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bookmark_add_remove_restores_set() {
        let db = UserDatabase::in_memory();
        db.add_bookmark("u1", "a").await.unwrap();
        db.add_bookmark("u1", "b").await.unwrap();
        let original = db.get_user_bookmarks("u1").await.unwrap();

        assert!(db.add_bookmark("u1", "c").await.unwrap());
        assert!(!db.add_bookmark("u1", "c").await.unwrap());
        assert!(db.remove_bookmark("u1", "c").await.unwrap());
        assert!(!db.remove_bookmark("u1", "c").await.unwrap());

        assert_eq!(db.get_user_bookmarks("u1").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_toggle_bookmark_flips_against_stored_set() {
        let db = UserDatabase::in_memory();
        db.add_bookmark("u1", "a").await.unwrap();

        assert!(!db.toggle_bookmark("u1", "a").await.unwrap());
        assert!(db.get_user_bookmarks("u1").await.unwrap().is_empty());
        assert!(db.toggle_bookmark("u1", "a").await.unwrap());
        assert_eq!(db.get_user_bookmarks("u1").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_activity_log_keeps_most_recent_hundred() {
        let db = UserDatabase::in_memory();
        for i in 0..150 {
            db.log_activity(
                "u1",
                ActivityKind::StoryDeleted {
                    story_id: format!("s{}", i),
                },
            )
            .await
            .unwrap();
        }

        let activity = db.get_user_activity("u1").await.unwrap();
        assert_eq!(activity.len(), ACTIVITY_LOG_CAP);
        let ids: Vec<String> = activity
            .iter()
            .map(|entry| match &entry.kind {
                ActivityKind::StoryDeleted { story_id } => story_id.clone(),
                other => panic!("unexpected entry {:?}", other),
            })
            .collect();
        let expected: Vec<String> = (50..150).rev().map(|i| format!("s{}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_story_lifecycle_round_trip() {
        let db = UserDatabase::in_memory();
        db.initialize_user("u1", &seed("Alex")).await.unwrap();

        let added = db.add_user_story("u1", &story("Hello")).await.unwrap();
        assert!(!added.id.is_empty());
        let draft = db
            .add_user_story(
                "u1",
                &NewStory {
                    id: Some("draft-1".into()),
                    ..story("Draft")
                },
            )
            .await
            .unwrap();
        assert_eq!(draft.id, "draft-1");

        let stories = db.get_user_stories("u1").await.unwrap();
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].title, "Hello");
        assert_eq!(stories[0].content, "Once upon a time");
        let profile = db.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.stats.stories_published, 2);

        db.delete_user_story("u1", &added.id).await.unwrap();
        let stories = db.get_user_stories("u1").await.unwrap();
        assert_eq!(stories.len(), 1);
        let profile = db.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.stats.stories_published, 1);

        let err = db.delete_user_story("u1", &added.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_story_id_is_rejected() {
        let db = UserDatabase::in_memory();
        let new = NewStory {
            id: Some("s1".into()),
            ..story("Hello")
        };
        db.add_user_story("u1", &new).await.unwrap();
        let err = db.add_user_story("u1", &new).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_story_publishes() {
        let db = UserDatabase::in_memory();
        let s = db.add_user_story("u1", &story("Hello")).await.unwrap();

        let updated = db
            .update_user_story(
                "u1",
                &s.id,
                &StoryUpdate {
                    status: Some(StoryStatus::Published),
                    ..StoryUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_published());
        assert!(updated.published_at.is_some());

        let err = db
            .update_user_story("u1", "missing", &StoryUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_comment_bumps_story_counter() {
        let db = UserDatabase::in_memory();
        db.initialize_user("author", &seed("Author")).await.unwrap();
        let s = db.add_user_story("author", &story("Hello")).await.unwrap();

        let comment = db
            .add_user_comment(
                "reader",
                &NewComment {
                    story_id: s.id.clone(),
                    content: "Lovely".into(),
                    story_author_id: Some("author".into()),
                    ..NewComment::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(comment.author_id, "reader");
        assert_eq!(db.get_user_comments("reader").await.unwrap().len(), 1);
        let stored = db.get_user_story("author", &s.id).await.unwrap().unwrap();
        assert_eq!(stored.comments, 1);
        let author = db.get_user_profile("author").await.unwrap().unwrap();
        assert_eq!(author.stats.total_comments, 1);
    }

    #[tokio::test]
    async fn test_record_story_view() {
        let db = UserDatabase::in_memory();
        db.initialize_user("u1", &seed("Alex")).await.unwrap();
        let s = db.add_user_story("u1", &story("Hello")).await.unwrap();

        assert_eq!(db.record_story_view("u1", &s.id).await.unwrap(), 1);
        assert_eq!(db.record_story_view("u1", &s.id).await.unwrap(), 2);
        let profile = db.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.stats.total_views, 2);
    }

    #[tokio::test]
    async fn test_dashboard_limits_recent_activity() {
        let db = UserDatabase::in_memory();
        db.initialize_user("u1", &seed("Alex")).await.unwrap();
        db.add_user_story("u1", &story("Hello")).await.unwrap();
        db.add_bookmark("u1", "other").await.unwrap();
        for _ in 0..15 {
            db.log_activity("u1", ActivityKind::UserLogin).await.unwrap();
        }

        let dashboard = db.get_user_dashboard_data("u1").await.unwrap();
        assert_eq!(dashboard.recent_activity.len(), RECENT_ACTIVITY);
        assert_eq!(dashboard.stories.len(), 1);
        assert_eq!(dashboard.bookmarks, vec!["other"]);
        assert_eq!(dashboard.analytics.drafts, 1);
        assert!(dashboard.profile.is_some());
    }

    #[tokio::test]
    async fn test_export_then_delete() {
        let db = UserDatabase::in_memory();
        db.initialize_user("u1", &seed("Alex")).await.unwrap();
        db.initialize_user("u2", &seed("Sam")).await.unwrap();
        db.add_user_story("u1", &story("Hello")).await.unwrap();
        db.toggle_like("u1", "x").await.unwrap();
        db.set_current_user(Some(&SessionUser {
            id: "u1".into(),
            name: "Alex".into(),
            email: String::new(),
        }))
        .await
        .unwrap();

        let export = db.export_user_data("u1").await.unwrap();
        assert_eq!(export.stories.len(), 1);
        assert_eq!(export.likes, vec!["x"]);

        db.delete_user_data("u1").await.unwrap();

        assert!(db.get_user_profile("u1").await.unwrap().is_none());
        assert!(db.get_user_stories("u1").await.unwrap().is_empty());
        assert!(db.current_user().await.unwrap().is_none());
        let registry = db.get_global_data().await.unwrap();
        assert_eq!(registry.users, vec!["u2"]);
        assert_eq!(registry.total_users, 1);
    }

    #[tokio::test]
    async fn test_delete_unwinds_follow_graph() {
        let db = UserDatabase::in_memory();
        for (id, name) in [("a", "Ana"), ("b", "Ben"), ("c", "Cy")] {
            db.initialize_user(id, &seed(name)).await.unwrap();
        }
        db.follow_user("a", "b").await.unwrap();
        db.follow_user("c", "a").await.unwrap();
        db.follow_user("c", "b").await.unwrap();

        db.delete_user_data("a").await.unwrap();

        let b = db.get_user_profile("b").await.unwrap().unwrap();
        assert_eq!(b.stats.followers, 1);
        assert_eq!(db.get_followers("b").await.unwrap(), vec!["c"]);

        let c = db.get_user_profile("c").await.unwrap().unwrap();
        assert_eq!(c.stats.following, 1);
        assert_eq!(db.get_user_following("c").await.unwrap(), vec!["b"]);

        // Cached counts agree with the graph
        assert_eq!(db.recount_followers("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_quota_failure_surfaces_and_leaves_data_untouched() {
        let storage = JsonStorage::new(Arc::new(MemoryStore::new())).with_quota(Some(600));
        let db = UserDatabase::new(storage);
        db.initialize_user("u1", &seed("Alex")).await.unwrap();

        let huge = NewStory {
            content: "x".repeat(1_000),
            ..story("Too big")
        };
        let err = db.add_user_story("u1", &huge).await.unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { .. }));

        assert!(db.get_user_stories("u1").await.unwrap().is_empty());
        let profile = db.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.stats.stories_published, 0);
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let db = UserDatabase::in_memory();

        db.initialize_user("u1", &seed("Alex")).await.unwrap();
        let hello = db.add_user_story("u1", &story("Hello")).await.unwrap();
        assert_eq!(
            db.get_user_profile("u1")
                .await
                .unwrap()
                .unwrap()
                .stats
                .stories_published,
            1
        );

        assert!(db.toggle_like("u2", &hello.id).await.unwrap());
        assert_eq!(db.get_user_likes("u2").await.unwrap(), vec![hello.id.clone()]);

        assert!(db.follow_user("u2", "u1").await.unwrap());
        assert_eq!(
            db.get_user_profile("u1")
                .await
                .unwrap()
                .unwrap()
                .stats
                .followers,
            1
        );
        assert_eq!(db.get_user_following("u2").await.unwrap(), vec!["u1"]);
    }
}
