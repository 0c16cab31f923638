//! Activity log endpoints.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use super::{reply, ApiResult};
use crate::auth::require_acting_user;
use crate::models::{ActivityEntry, ActivityKind};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

/// GET /api/users/:id/activity - Most recent first.
pub async fn list_activity(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityEntry>> {
    let result = state.db.get_user_activity(&user_id).await.map(|mut entries| {
        if let Some(limit) = params.limit {
            entries.truncate(limit);
        }
        entries
    });
    reply(&state, result).await
}

/// POST /api/users/:id/activity - Record an event, e.g. `{"type":"user_login"}`.
pub async fn log_activity(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(kind): Json<ActivityKind>,
) -> ApiResult<ActivityEntry> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        state.db.log_activity(&user_id, kind).await
    }
    .await;
    reply(&state, result).await
}
