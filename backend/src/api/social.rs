//! Follow graph endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
};
use serde::Serialize;

use super::{reply, ApiResult};
use crate::auth::require_acting_user;
use crate::errors::AppError;
use crate::models::ActivityKind;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowChange {
    pub target_id: String,
    pub following: bool,
    pub changed: bool,
}

/// GET /api/users/:id/following
pub async fn list_following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<String>> {
    let result = state.db.get_user_following(&user_id).await;
    reply(&state, result).await
}

/// GET /api/users/:id/followers - Derived from the follow graph, not the cached count.
pub async fn list_followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<String>> {
    let result = state.db.get_followers(&user_id).await;
    reply(&state, result).await
}

/// PUT /api/users/:id/following/:target_id
pub async fn follow(
    State(state): State<AppState>,
    Path((user_id, target_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<FollowChange> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let changed = state.db.follow_user(&user_id, &target_id).await?;
        if changed {
            state
                .db
                .log_activity(
                    &user_id,
                    ActivityKind::UserFollowed {
                        target_id: target_id.clone(),
                    },
                )
                .await?;
        }
        Ok::<_, AppError>(FollowChange {
            target_id,
            following: true,
            changed,
        })
    }
    .await;
    reply(&state, result).await
}

/// DELETE /api/users/:id/following/:target_id
pub async fn unfollow(
    State(state): State<AppState>,
    Path((user_id, target_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<FollowChange> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let changed = state.db.unfollow_user(&user_id, &target_id).await?;
        if changed {
            state
                .db
                .log_activity(
                    &user_id,
                    ActivityKind::UserUnfollowed {
                        target_id: target_id.clone(),
                    },
                )
                .await?;
        }
        Ok::<_, AppError>(FollowChange {
            target_id,
            following: false,
            changed,
        })
    }
    .await;
    reply(&state, result).await
}

/// POST /api/users/:id/followers/recount - Rebuild the cached follower count.
pub async fn recount_followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<u64> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        state.db.recount_followers(&user_id).await
    }
    .await;
    reply(&state, result).await
}
