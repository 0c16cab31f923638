//! User profile, registry and whole-account endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use super::{reply, ApiResult};
use crate::auth::require_acting_user;
use crate::errors::AppError;
use crate::models::{
    ActivityKind, DashboardData, GlobalData, NewUser, ProfileUpdate, UserExport, UserProfile,
};
use crate::AppState;

/// Body of `POST /api/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
    #[serde(flatten)]
    pub profile: NewUser,
}

/// GET /api/registry - All initialized users.
pub async fn get_registry(State(state): State<AppState>) -> ApiResult<GlobalData> {
    let result = state.db.get_global_data().await;
    reply(&state, result).await
}

/// POST /api/users - Initialize a user. Returns the existing profile if there is one.
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<UserProfile> {
    let result = async {
        require_acting_user(&headers, &request.id)?;
        state.db.initialize_user(&request.id, &request.profile).await
    }
    .await;
    reply(&state, result).await
}

/// GET /api/users/:id/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserProfile> {
    let result = match state.db.get_user_profile(&user_id).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(AppError::NotFound(format!("User {} not found", user_id))),
        Err(e) => Err(e),
    };
    reply(&state, result).await
}

/// PUT /api/users/:id/profile - Partial profile update.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<UserProfile> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let profile = state.db.update_user_profile(&user_id, &update).await?;
        state
            .db
            .log_activity(
                &user_id,
                ActivityKind::ProfileUpdated {
                    fields: update.changed_fields(),
                },
            )
            .await?;
        Ok::<_, AppError>(profile)
    }
    .await;
    reply(&state, result).await
}

/// DELETE /api/users/:id - Erase every record of the user.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<()> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let stories = state.db.get_user_stories(&user_id).await?;
        state.db.delete_user_data(&user_id).await?;

        for story in &stories {
            if let Err(e) = state.search.remove_story(&story.id).await {
                tracing::warn!("Failed to remove story {} from index: {}", story.id, e);
            }
        }
        let removed: Vec<String> = stories.into_iter().map(|s| s.id).collect();
        let mut sessions = state.sessions.lock().await;
        sessions.remove(&user_id);
        for session in sessions.sessions_mut() {
            session.forget_stories(&removed);
        }
        Ok::<_, AppError>(())
    }
    .await;
    reply(&state, result).await
}

/// GET /api/users/:id/export
pub async fn export_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<UserExport> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        state.db.export_user_data(&user_id).await
    }
    .await;
    reply(&state, result).await
}

/// GET /api/users/:id/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<DashboardData> {
    let result = state.db.get_user_dashboard_data(&user_id).await;
    reply(&state, result).await
}
