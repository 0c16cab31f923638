//! Bookmark, like and comment endpoints.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{reply, ApiResult};
use crate::auth::require_acting_user;
use crate::errors::AppError;
use crate::models::{ActivityKind, Comment, NewComment};
use crate::AppState;

/// Outcome of a set-membership write.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    pub story_id: String,
    /// Membership after the call
    pub active: bool,
    /// Whether the call changed anything
    pub changed: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeParams {
    /// Author of the story, so the stored counters move with the like.
    pub author_id: Option<String>,
}

/// GET /api/users/:id/bookmarks
pub async fn list_bookmarks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<String>> {
    let result = state.db.get_user_bookmarks(&user_id).await;
    reply(&state, result).await
}

/// PUT /api/users/:id/bookmarks/:story_id
pub async fn add_bookmark(
    State(state): State<AppState>,
    Path((user_id, story_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<MembershipChange> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let changed = state.db.add_bookmark(&user_id, &story_id).await?;
        if changed {
            state
                .db
                .log_activity(&user_id, ActivityKind::bookmark(&story_id, true))
                .await?;
        }
        Ok::<_, AppError>(MembershipChange {
            story_id,
            active: true,
            changed,
        })
    }
    .await;
    reply(&state, result).await
}

/// DELETE /api/users/:id/bookmarks/:story_id
pub async fn remove_bookmark(
    State(state): State<AppState>,
    Path((user_id, story_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<MembershipChange> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let changed = state.db.remove_bookmark(&user_id, &story_id).await?;
        if changed {
            state
                .db
                .log_activity(&user_id, ActivityKind::bookmark(&story_id, false))
                .await?;
        }
        Ok::<_, AppError>(MembershipChange {
            story_id,
            active: false,
            changed,
        })
    }
    .await;
    reply(&state, result).await
}

/// GET /api/users/:id/likes
pub async fn list_likes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<String>> {
    let result = state.db.get_user_likes(&user_id).await;
    reply(&state, result).await
}

/// POST /api/users/:id/likes/:story_id - Toggle a like. `?authorId=` also moves the author's
/// counters.
pub async fn toggle_like(
    State(state): State<AppState>,
    Path((user_id, story_id)): Path<(String, String)>,
    Query(params): Query<LikeParams>,
    headers: HeaderMap,
) -> ApiResult<MembershipChange> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let liked = match params.author_id.as_deref() {
            Some(author_id) => {
                state
                    .db
                    .toggle_like_on(&user_id, author_id, &story_id)
                    .await?
            }
            None => state.db.toggle_like(&user_id, &story_id).await?,
        };
        state
            .db
            .log_activity(&user_id, ActivityKind::like(&story_id, liked))
            .await?;
        Ok::<_, AppError>(MembershipChange {
            story_id,
            active: liked,
            changed: true,
        })
    }
    .await;
    reply(&state, result).await
}

/// GET /api/users/:id/comments - Comments written by the user.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<Comment>> {
    let result = state.db.get_user_comments(&user_id).await;
    reply(&state, result).await
}

/// POST /api/users/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<NewComment>,
) -> ApiResult<Comment> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let comment = state.db.add_user_comment(&user_id, &request).await?;
        state
            .db
            .log_activity(
                &user_id,
                ActivityKind::CommentAdded {
                    comment_id: comment.id.clone(),
                    story_id: comment.story_id.clone(),
                },
            )
            .await?;
        Ok::<_, AppError>(comment)
    }
    .await;
    reply(&state, result).await
}
