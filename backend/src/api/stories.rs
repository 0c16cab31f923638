//! Story endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use super::{reply, ApiResult};
use crate::auth::{acting_user, require_acting_user};
use crate::errors::AppError;
use crate::models::{ActivityKind, NewStory, Story, StoryUpdate, StoryView};
use crate::AppState;

/// Body of the view counter endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewCount {
    pub story_id: String,
    pub views: u64,
}

/// Keep the search index in step with a stored story. Index failures never fail the request.
async fn reindex(state: &AppState, story: &Story) {
    if let Err(e) = state.search.index_story(story).await {
        tracing::warn!("Failed to index story {}: {}", story.id, e);
    }
}

/// GET /api/users/:id/stories - The author's stories, flagged for the acting user if one is named.
pub async fn list_stories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Vec<StoryView>> {
    let result = async {
        let stories = state.db.get_user_stories(&user_id).await?;
        let (likes, bookmarks) = match acting_user(&headers) {
            Some(viewer) => (
                state.db.get_user_likes(viewer).await?,
                state.db.get_user_bookmarks(viewer).await?,
            ),
            None => (Vec::new(), Vec::new()),
        };

        let views = stories
            .into_iter()
            .map(|story| StoryView {
                is_liked: likes.contains(&story.id),
                is_bookmarked: bookmarks.contains(&story.id),
                story,
            })
            .collect();
        Ok::<_, AppError>(views)
    }
    .await;
    reply(&state, result).await
}

/// POST /api/users/:id/stories
pub async fn create_story(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<NewStory>,
) -> ApiResult<Story> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let story = state.db.add_user_story(&user_id, &request).await?;
        state
            .db
            .log_activity(
                &user_id,
                ActivityKind::StoryCreated {
                    story_id: story.id.clone(),
                    title: story.title.clone(),
                },
            )
            .await?;
        reindex(&state, &story).await;
        Ok::<_, AppError>(story)
    }
    .await;
    reply(&state, result).await
}

/// PUT /api/users/:id/stories/:story_id
pub async fn update_story(
    State(state): State<AppState>,
    Path((user_id, story_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(update): Json<StoryUpdate>,
) -> ApiResult<Story> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let story = state
            .db
            .update_user_story(&user_id, &story_id, &update)
            .await?;
        state
            .db
            .log_activity(
                &user_id,
                ActivityKind::StoryUpdated {
                    story_id: story.id.clone(),
                    title: story.title.clone(),
                },
            )
            .await?;
        reindex(&state, &story).await;
        Ok::<_, AppError>(story)
    }
    .await;
    reply(&state, result).await
}

/// DELETE /api/users/:id/stories/:story_id
pub async fn delete_story(
    State(state): State<AppState>,
    Path((user_id, story_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Story> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let story = state.db.delete_user_story(&user_id, &story_id).await?;
        state
            .db
            .log_activity(
                &user_id,
                ActivityKind::StoryDeleted {
                    story_id: story.id.clone(),
                },
            )
            .await?;
        if let Err(e) = state.search.remove_story(&story.id).await {
            tracing::warn!("Failed to remove story {} from index: {}", story.id, e);
        }
        let removed = [story.id.clone()];
        for session in state.sessions.lock().await.sessions_mut() {
            session.forget_stories(&removed);
        }
        Ok::<_, AppError>(story)
    }
    .await;
    reply(&state, result).await
}

/// POST /api/users/:id/stories/:story_id/views - Count one read. Any reader may call it.
pub async fn record_view(
    State(state): State<AppState>,
    Path((user_id, story_id)): Path<(String, String)>,
) -> ApiResult<ViewCount> {
    let result = state
        .db
        .record_story_view(&user_id, &story_id)
        .await
        .map(|views| ViewCount { story_id, views });
    reply(&state, result).await
}
