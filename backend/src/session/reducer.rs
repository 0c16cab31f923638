//! Pure session state transitions.

use std::collections::BTreeSet;

use serde::Serialize;

use super::action::Action;
use crate::models::{Comment, CommentView, SessionUser, Story, StoryView};

/// In-memory view of the shared catalogue plus the signed-in viewer's own sets.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub user: Option<SessionUser>,
    pub stories: Vec<Story>,
    pub comments: Vec<Comment>,
    pub liked_stories: BTreeSet<String>,
    pub bookmarked_stories: BTreeSet<String>,
    pub liked_comments: BTreeSet<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn story(&self, story_id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == story_id)
    }

    /// Stories joined with the viewer's flags.
    pub fn story_views(&self) -> Vec<StoryView> {
        self.stories
            .iter()
            .map(|story| StoryView {
                is_liked: self.liked_stories.contains(&story.id),
                is_bookmarked: self.bookmarked_stories.contains(&story.id),
                story: story.clone(),
            })
            .collect()
    }

    pub fn comment_views(&self) -> Vec<CommentView> {
        self.comments
            .iter()
            .map(|comment| CommentView {
                is_liked: self.liked_comments.contains(&comment.id),
                comment: comment.clone(),
            })
            .collect()
    }

    fn story_mut(&mut self, story_id: &str) -> Option<&mut Story> {
        self.stories.iter_mut().find(|s| s.id == story_id)
    }

    fn clear_viewer_sets(&mut self) {
        self.liked_stories.clear();
        self.bookmarked_stories.clear();
        self.liked_comments.clear();
    }
}

/// Flip membership of `id` in `set`. Returns whether it is now a member.
fn toggle(set: &mut BTreeSet<String>, id: &str) -> bool {
    if set.remove(id) {
        false
    } else {
        set.insert(id.to_string());
        true
    }
}

fn bump(count: &mut u64, up: bool) {
    *count = if up {
        *count + 1
    } else {
        count.saturating_sub(1)
    };
}

/// Compute the state after `action`. Never touches storage.
pub fn reduce(state: &SessionState, action: &Action) -> SessionState {
    let mut next = state.clone();

    match action {
        Action::SetUser(user) => {
            let same_user = match (&state.user, user) {
                (Some(current), Some(new)) => current.id == new.id,
                _ => false,
            };
            if !same_user {
                next.clear_viewer_sets();
            }
            next.user = user.clone();
        }
        Action::AddStory(story) => {
            let mut story = story.clone();
            story.normalize();
            next.stories.retain(|s| s.id != story.id);
            next.stories.insert(0, story);
        }
        Action::UpdateStory(patch) => {
            if let Some(story) = next.story_mut(&patch.id) {
                story.apply(&patch.changes, patch.at);
            }
        }
        Action::DeleteStory(story_id) => {
            next.stories.retain(|s| &s.id != story_id);
        }
        Action::LikeStory(story_id) => {
            let liked = toggle(&mut next.liked_stories, story_id);
            if let Some(story) = next.story_mut(story_id) {
                bump(&mut story.likes, liked);
            }
        }
        Action::BookmarkStory(story_id) => {
            toggle(&mut next.bookmarked_stories, story_id);
        }
        Action::AddComment(comment) => {
            if !next.comments.iter().any(|c| c.id == comment.id) {
                next.comments.push(comment.clone());
                if let Some(story) = next.story_mut(&comment.story_id) {
                    story.comments += 1;
                }
            }
        }
        Action::LikeComment(comment_id) => {
            let liked = toggle(&mut next.liked_comments, comment_id);
            if let Some(comment) = next.comments.iter_mut().find(|c| &c.id == comment_id) {
                bump(&mut comment.likes, liked);
            }
        }
        Action::FollowUser(_) | Action::UnfollowUser(_) => {}
        Action::LoadUserData(sets) => {
            next.liked_stories = sets.liked_stories.iter().cloned().collect();
            next.bookmarked_stories = sets.bookmarked_stories.iter().cloned().collect();
        }
        Action::LoadData(catalogue) => {
            next.stories = catalogue.stories.clone();
            next.comments = catalogue.comments.clone();
            if let Some(user) = &catalogue.user {
                next.user = Some(user.clone());
            }
        }
    }

    next
}
