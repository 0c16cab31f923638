//! Per-viewer session store.
//!
//! [`reduce`] computes transitions without side effects. [`Session::dispatch`] wraps it: the
//! action is first resolved against the store, then reduced, then its persistence effects run,
//! and only if those succeed does the new state replace the old one.

mod action;
mod pool;
mod reducer;

pub use action::*;
pub use pool::SessionPool;
pub use reducer::*;

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::{validate_user_id, UserDatabase};
use crate::errors::AppError;
use crate::fixtures;
use crate::models::{ActivityKind, NewComment, NewStory, SessionUser};

/// Shared stories plus demo fixtures. Stored stories win over fixtures with the same id.
pub async fn load_catalogue(db: &UserDatabase, with_demo: bool) -> Result<Catalogue, AppError> {
    let mut stories = db.all_stories().await?;
    let mut comments = Vec::new();

    if with_demo {
        let stored: HashSet<String> = stories.iter().map(|s| s.id.clone()).collect();
        stories.extend(
            fixtures::demo_stories()
                .into_iter()
                .filter(|s| !stored.contains(&s.id)),
        );
        comments = fixtures::demo_comments();
    }

    stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Catalogue {
        stories,
        comments,
        user: None,
    })
}

/// One viewer's session over the shared store.
pub struct Session {
    db: Arc<UserDatabase>,
    state: SessionState,
}

impl Session {
    pub fn new(db: Arc<UserDatabase>) -> Self {
        Self {
            db,
            state: SessionState::default(),
        }
    }

    /// Start a signed-in session for `user`.
    pub async fn open(
        db: Arc<UserDatabase>,
        user: SessionUser,
        catalogue: Catalogue,
    ) -> Result<Self, AppError> {
        let mut session = Self::new(db);
        session.dispatch(Action::LoadData(catalogue)).await?;
        session.dispatch(Action::SetUser(Some(user))).await?;
        session
            .dispatch(Action::LoadUserData(ViewerSets::default()))
            .await?;
        Ok(session)
    }

    /// Restore the session of the persisted current user, or an anonymous one.
    pub async fn resume(db: Arc<UserDatabase>, mut catalogue: Catalogue) -> Result<Self, AppError> {
        catalogue.user = db.current_user().await?;
        let mut session = Self::new(db);
        session.dispatch(Action::LoadData(catalogue)).await?;
        if session.state.is_authenticated() {
            session
                .dispatch(Action::LoadUserData(ViewerSets::default()))
                .await?;
        }
        Ok(session)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user_id(&self) -> Option<&str> {
        self.state.user.as_ref().map(|u| u.id.as_str())
    }

    /// Drop stories deleted outside this session from its catalogue. Nothing is written.
    pub fn forget_stories(&mut self, story_ids: &[String]) {
        for story_id in story_ids {
            self.state = reduce(&self.state, &Action::DeleteStory(story_id.clone()));
        }
    }

    /// Apply `action`. On error the state is left as it was.
    pub async fn dispatch(&mut self, action: Action) -> Result<&SessionState, AppError> {
        let action = self.resolve(action).await?;
        let mut next = reduce(&self.state, &action);
        self.persist(&action, &mut next).await?;

        tracing::debug!(
            action = action.name(),
            user_id = self.user_id().unwrap_or("anonymous"),
            "Dispatched session action"
        );
        self.state = next;
        Ok(&self.state)
    }

    fn require_user(&self) -> Result<SessionUser, AppError> {
        self.state
            .user
            .clone()
            .ok_or_else(|| AppError::Unauthorized("Sign in to continue".to_string()))
    }

    /// Fill in the parts of `action` that come from the session or the store.
    async fn resolve(&self, action: Action) -> Result<Action, AppError> {
        if action.requires_user() {
            self.require_user()?;
        }

        let resolved = match action {
            Action::SetUser(Some(user)) => {
                validate_user_id(&user.id)?;
                Action::SetUser(Some(user))
            }
            Action::AddStory(mut story) => {
                let user = self.require_user()?;
                if story.author_id.is_empty() {
                    story.author_id = user.id.clone();
                }
                if story.author_id == user.id && story.author_name.is_none() {
                    story.author_name = Some(user.name);
                }
                Action::AddStory(story)
            }
            Action::AddComment(mut comment) => {
                let user = self.require_user()?;
                if comment.content.trim().is_empty() {
                    return Err(AppError::Validation(
                        "Comment content is required".to_string(),
                    ));
                }
                comment.author_id = user.id;
                if comment.author_name.is_none() {
                    comment.author_name = Some(user.name);
                }
                Action::AddComment(comment)
            }
            Action::LoadUserData(_) => {
                let sets = match self.user_id() {
                    Some(user_id) => ViewerSets {
                        liked_stories: self.db.get_user_likes(user_id).await?,
                        bookmarked_stories: self.db.get_user_bookmarks(user_id).await?,
                    },
                    None => ViewerSets::default(),
                };
                Action::LoadUserData(sets)
            }
            Action::LoadData(catalogue) => {
                if let Some(user) = &catalogue.user {
                    // A catalogue may only restore who is already signed in here or, for a
                    // signed-out session, the persisted current user.
                    let allowed = match &self.state.user {
                        Some(current) => current.id == user.id,
                        None => self
                            .db
                            .current_user()
                            .await?
                            .is_some_and(|persisted| persisted.id == user.id),
                    };
                    if !allowed {
                        return Err(AppError::Forbidden(format!(
                            "Session cannot switch to user {}",
                            user.id
                        )));
                    }
                }
                Action::LoadData(catalogue)
            }
            other => other,
        };
        Ok(resolved)
    }

    /// Run the store side effects of an already reduced action. May realign `next` with what the
    /// store reports.
    async fn persist(&self, action: &Action, next: &mut SessionState) -> Result<(), AppError> {
        let db = &self.db;

        match action {
            Action::SetUser(Some(user)) => {
                if db.get_user_profile(&user.id).await?.is_none() {
                    db.initialize_user(&user.id, &user.seed()).await?;
                }
                db.log_activity(&user.id, ActivityKind::UserLogin).await?;
                db.set_current_user(Some(user)).await?;
            }
            Action::SetUser(None) => db.set_current_user(None).await?,
            Action::AddStory(story) => {
                let user = self.require_user()?;
                if story.author_id == user.id {
                    let stored = db.add_user_story(&user.id, &NewStory::from(story)).await?;
                    db.log_activity(
                        &user.id,
                        ActivityKind::StoryCreated {
                            story_id: stored.id.clone(),
                            title: stored.title.clone(),
                        },
                    )
                    .await?;
                    if let Some(slot) = next.stories.iter_mut().find(|s| s.id == stored.id) {
                        *slot = stored;
                    }
                }
            }
            Action::UpdateStory(patch) => {
                let user = self.require_user()?;
                if self.owns(&user, &patch.id) {
                    let stored = db
                        .update_user_story(&user.id, &patch.id, &patch.changes)
                        .await?;
                    db.log_activity(
                        &user.id,
                        ActivityKind::StoryUpdated {
                            story_id: stored.id.clone(),
                            title: stored.title.clone(),
                        },
                    )
                    .await?;
                    if let Some(slot) = next.stories.iter_mut().find(|s| s.id == stored.id) {
                        *slot = stored;
                    }
                }
            }
            Action::DeleteStory(story_id) => {
                let user = self.require_user()?;
                if self.owns(&user, story_id) {
                    db.delete_user_story(&user.id, story_id).await?;
                    db.log_activity(
                        &user.id,
                        ActivityKind::StoryDeleted {
                            story_id: story_id.clone(),
                        },
                    )
                    .await?;
                }
            }
            Action::LikeStory(story_id) => {
                let user = self.require_user()?;
                let expected = next.liked_stories.contains(story_id);
                let liked = match self.state.story(story_id) {
                    Some(story) if !story.author_id.is_empty() => {
                        db.toggle_like_on(&user.id, &story.author_id, story_id)
                            .await?
                    }
                    _ => db.toggle_like(&user.id, story_id).await?,
                };
                if liked != expected {
                    tracing::warn!(
                        user_id = %user.id,
                        story_id,
                        liked,
                        "Session like state drifted from store, realigning"
                    );
                    *next = reduce(next, action);
                }
                db.log_activity(&user.id, ActivityKind::like(story_id, liked))
                    .await?;
            }
            Action::BookmarkStory(story_id) => {
                let user = self.require_user()?;
                let expected = next.bookmarked_stories.contains(story_id);
                let bookmarked = db.toggle_bookmark(&user.id, story_id).await?;
                if bookmarked != expected {
                    tracing::warn!(
                        user_id = %user.id,
                        story_id,
                        bookmarked,
                        "Session bookmark state drifted from store, realigning"
                    );
                    *next = reduce(next, action);
                }
                db.log_activity(&user.id, ActivityKind::bookmark(story_id, bookmarked))
                    .await?;
            }
            Action::AddComment(comment) => {
                let user = self.require_user()?;
                if self.state.comments.iter().any(|c| c.id == comment.id) {
                    return Ok(());
                }
                let story_author_id = self
                    .state
                    .story(&comment.story_id)
                    .map(|s| s.author_id.clone())
                    .filter(|id| !id.is_empty());
                let new = NewComment {
                    id: Some(comment.id.clone()),
                    story_id: comment.story_id.clone(),
                    content: comment.content.clone(),
                    author_name: comment.author_name.clone(),
                    story_author_id,
                };
                let stored = db.add_user_comment(&user.id, &new).await?;
                db.log_activity(
                    &user.id,
                    ActivityKind::CommentAdded {
                        comment_id: stored.id.clone(),
                        story_id: stored.story_id.clone(),
                    },
                )
                .await?;
                if let Some(slot) = next.comments.iter_mut().find(|c| c.id == stored.id) {
                    *slot = stored;
                }
            }
            Action::FollowUser(target_id) => {
                let user = self.require_user()?;
                if db.follow_user(&user.id, target_id).await? {
                    db.log_activity(
                        &user.id,
                        ActivityKind::UserFollowed {
                            target_id: target_id.clone(),
                        },
                    )
                    .await?;
                }
            }
            Action::UnfollowUser(target_id) => {
                let user = self.require_user()?;
                if db.unfollow_user(&user.id, target_id).await? {
                    db.log_activity(
                        &user.id,
                        ActivityKind::UserUnfollowed {
                            target_id: target_id.clone(),
                        },
                    )
                    .await?;
                }
            }
            Action::LikeComment(_) | Action::LoadUserData(_) | Action::LoadData(_) => {}
        }
        Ok(())
    }

    /// Whether the pre-action state lists `story_id` as written by `user`.
    fn owns(&self, user: &SessionUser, story_id: &str) -> bool {
        self.state
            .story(story_id)
            .is_some_and(|s| s.author_id == user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comment, NewUser, Story, StoryStatus, StoryUpdate};
    use chrono::Utc;

    fn alex() -> SessionUser {
        SessionUser {
            id: "u1".into(),
            name: "Alex".into(),
            email: "alex@example.com".into(),
        }
    }

    fn draft(title: &str) -> Story {
        serde_json::from_value(serde_json::json!({ "title": title, "content": "Words here" }))
            .unwrap()
    }

    async fn signed_in() -> (Arc<UserDatabase>, Session) {
        let db = Arc::new(UserDatabase::in_memory());
        let session = Session::open(db.clone(), alex(), Catalogue::default())
            .await
            .unwrap();
        (db, session)
    }

    #[tokio::test]
    async fn test_login_initializes_profile_and_persists_user() {
        let (db, session) = signed_in().await;

        assert!(session.state().is_authenticated());
        let profile = db.get_user_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.name, "Alex");
        assert_eq!(db.current_user().await.unwrap(), Some(alex()));
        let activity = db.get_user_activity("u1").await.unwrap();
        assert_eq!(activity[0].kind, ActivityKind::UserLogin);
    }

    #[tokio::test]
    async fn test_anonymous_engagement_is_rejected() {
        let db = Arc::new(UserDatabase::in_memory());
        let mut session = Session::new(db.clone());

        let err = session
            .dispatch(Action::LikeStory("s1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(session.state().liked_stories.is_empty());
    }

    #[tokio::test]
    async fn test_story_actions_forward_to_store() {
        let (db, mut session) = signed_in().await;

        session
            .dispatch(Action::AddStory(draft("Hello")))
            .await
            .unwrap();
        let stored = db.get_user_stories("u1").await.unwrap();
        assert_eq!(stored.len(), 1);
        let id = stored[0].id.clone();
        assert_eq!(session.state().stories[0], stored[0]);
        assert_eq!(stored[0].author_name.as_deref(), Some("Alex"));

        session
            .dispatch(Action::UpdateStory(StoryPatch {
                id: id.clone(),
                changes: StoryUpdate {
                    status: Some(StoryStatus::Published),
                    ..StoryUpdate::default()
                },
                at: Utc::now(),
            }))
            .await
            .unwrap();
        assert!(db.get_user_story("u1", &id).await.unwrap().unwrap().is_published());

        session.dispatch(Action::DeleteStory(id)).await.unwrap();
        assert!(db.get_user_stories("u1").await.unwrap().is_empty());
        assert!(session.state().stories.is_empty());

        let kinds: Vec<&str> = db
            .get_user_activity("u1")
            .await
            .unwrap()
            .iter()
            .map(|e| e.kind.type_tag())
            .collect();
        assert_eq!(
            kinds,
            vec!["story_deleted", "story_updated", "story_created", "user_login"]
        );
    }

    #[tokio::test]
    async fn test_foreign_story_changes_stay_in_memory() {
        let db = Arc::new(UserDatabase::in_memory());
        db.initialize_user("u2", &NewUser::default()).await.unwrap();
        let theirs = db
            .add_user_story(
                "u2",
                &NewStory {
                    title: "Theirs".into(),
                    ..NewStory::default()
                },
            )
            .await
            .unwrap();
        let catalogue = load_catalogue(&db, false).await.unwrap();
        let mut session = Session::open(db.clone(), alex(), catalogue).await.unwrap();

        session
            .dispatch(Action::DeleteStory(theirs.id.clone()))
            .await
            .unwrap();
        assert!(session.state().story(&theirs.id).is_none());
        assert_eq!(db.get_user_stories("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_like_writes_through_and_updates_author() {
        let db = Arc::new(UserDatabase::in_memory());
        db.initialize_user("u2", &NewUser::default()).await.unwrap();
        let theirs = db
            .add_user_story(
                "u2",
                &NewStory {
                    title: "Theirs".into(),
                    ..NewStory::default()
                },
            )
            .await
            .unwrap();
        let catalogue = load_catalogue(&db, false).await.unwrap();
        let mut session = Session::open(db.clone(), alex(), catalogue).await.unwrap();

        let state = session
            .dispatch(Action::LikeStory(theirs.id.clone()))
            .await
            .unwrap();
        assert!(state.story_views()[0].is_liked);
        assert_eq!(state.story(&theirs.id).unwrap().likes, 1);

        assert_eq!(db.get_user_likes("u1").await.unwrap(), vec![theirs.id.clone()]);
        let stored = db.get_user_story("u2", &theirs.id).await.unwrap().unwrap();
        assert_eq!(stored.likes, 1);
    }

    #[tokio::test]
    async fn test_like_realigns_with_store() {
        let (db, mut session) = signed_in().await;
        // Liked elsewhere after this session loaded its sets
        db.toggle_like("u1", "s9").await.unwrap();

        let state = session
            .dispatch(Action::LikeStory("s9".into()))
            .await
            .unwrap();

        // The store toggled to unliked, so the session follows
        assert!(!state.liked_stories.contains("s9"));
        assert!(db.get_user_likes("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bookmark_realigns_with_store() {
        let (db, mut session) = signed_in().await;
        // Bookmarked through the REST route after this session loaded its sets
        db.add_bookmark("u1", "s1").await.unwrap();

        let state = session
            .dispatch(Action::BookmarkStory("s1".into()))
            .await
            .unwrap();

        assert!(!state.bookmarked_stories.contains("s1"));
        assert!(db.get_user_bookmarks("u1").await.unwrap().is_empty());
        let activity = db.get_user_activity("u1").await.unwrap();
        assert_eq!(
            activity[0].kind,
            ActivityKind::StoryUnbookmarked {
                story_id: "s1".into()
            }
        );
    }

    #[tokio::test]
    async fn test_forget_stories_leaves_store_alone() {
        let db = Arc::new(UserDatabase::in_memory());
        db.initialize_user("u2", &NewUser::default()).await.unwrap();
        let theirs = db
            .add_user_story(
                "u2",
                &NewStory {
                    title: "Theirs".into(),
                    ..NewStory::default()
                },
            )
            .await
            .unwrap();
        let catalogue = load_catalogue(&db, false).await.unwrap();
        let mut session = Session::open(db.clone(), alex(), catalogue).await.unwrap();

        session.forget_stories(&[theirs.id.clone()]);

        assert!(session.state().stories.is_empty());
        assert_eq!(db.get_user_stories("u2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_data_cannot_switch_user() {
        let (db, mut session) = signed_in().await;
        db.initialize_user("victim", &NewUser::default()).await.unwrap();

        let err = session
            .dispatch(Action::LoadData(Catalogue {
                user: Some(SessionUser {
                    id: "victim".into(),
                    name: "Victim".into(),
                    email: String::new(),
                }),
                ..Catalogue::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(session.user_id(), Some("u1"));

        // Signed out, only the persisted current user may be restored
        session.dispatch(Action::SetUser(None)).await.unwrap();
        let err = session
            .dispatch(Action::LoadData(Catalogue {
                user: Some(SessionUser {
                    id: "victim".into(),
                    name: "Victim".into(),
                    email: String::new(),
                }),
                ..Catalogue::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(!session.state().is_authenticated());

        // Signing out also cleared the persisted user
        let reloaded = session
            .dispatch(Action::LoadData(Catalogue {
                user: Some(alex()),
                ..Catalogue::default()
            }))
            .await;
        assert!(reloaded.is_err());
    }

    #[tokio::test]
    async fn test_bookmark_and_follow_forward() {
        let (db, mut session) = signed_in().await;
        db.initialize_user("u2", &NewUser::default()).await.unwrap();

        session
            .dispatch(Action::BookmarkStory("s1".into()))
            .await
            .unwrap();
        assert_eq!(db.get_user_bookmarks("u1").await.unwrap(), vec!["s1"]);
        session
            .dispatch(Action::BookmarkStory("s1".into()))
            .await
            .unwrap();
        assert!(db.get_user_bookmarks("u1").await.unwrap().is_empty());

        session
            .dispatch(Action::FollowUser("u2".into()))
            .await
            .unwrap();
        let u2 = db.get_user_profile("u2").await.unwrap().unwrap();
        assert_eq!(u2.stats.followers, 1);

        session
            .dispatch(Action::UnfollowUser("u2".into()))
            .await
            .unwrap();
        let u2 = db.get_user_profile("u2").await.unwrap().unwrap();
        assert_eq!(u2.stats.followers, 0);
    }

    #[tokio::test]
    async fn test_comment_is_persisted_and_likes_stay_local() {
        let (db, mut session) = signed_in().await;
        let comment: Comment = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "storyId": "s1",
            "content": "Great read"
        }))
        .unwrap();

        session.dispatch(Action::AddComment(comment)).await.unwrap();
        let stored = db.get_user_comments("u1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].author_id, "u1");

        let state = session
            .dispatch(Action::LikeComment("c1".into()))
            .await
            .unwrap();
        assert_eq!(state.comments[0].likes, 1);
        assert_eq!(db.get_user_comments("u1").await.unwrap()[0].likes, 0);
    }

    #[tokio::test]
    async fn test_failed_persistence_keeps_previous_state() {
        let (_db, mut session) = signed_in().await;
        let before = session.state().clone();

        let err = session
            .dispatch(Action::FollowUser("u1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(session.state(), &before);
    }

    #[tokio::test]
    async fn test_resume_restores_viewer_sets() {
        let (db, mut session) = signed_in().await;
        session
            .dispatch(Action::BookmarkStory("s1".into()))
            .await
            .unwrap();

        let resumed = Session::resume(db.clone(), Catalogue::default())
            .await
            .unwrap();
        assert_eq!(resumed.user_id(), Some("u1"));
        assert!(resumed.state().bookmarked_stories.contains("s1"));

        session.dispatch(Action::SetUser(None)).await.unwrap();
        let anonymous = Session::resume(db, Catalogue::default()).await.unwrap();
        assert!(!anonymous.state().is_authenticated());
    }
}
