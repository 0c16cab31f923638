//! Server-held viewer sessions driven by reducer actions.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use super::{reply, ApiResult};
use crate::auth::require_acting_user;
use crate::errors::AppError;
use crate::models::{CommentView, SessionUser, StoryView};
use crate::session::{load_catalogue, Action, Session, SessionPool, SessionState};
use crate::AppState;

/// What a client sees of its session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<SessionUser>,
    pub authenticated: bool,
    pub stories: Vec<StoryView>,
    pub comments: Vec<CommentView>,
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            user: state.user.clone(),
            authenticated: state.is_authenticated(),
            stories: state.story_views(),
            comments: state.comment_views(),
        }
    }
}

async fn open_session(state: &AppState, user_id: &str) -> Result<Session, AppError> {
    let catalogue = load_catalogue(&state.db, state.config.seed_demo).await?;
    let signed_in = state.db.current_user().await?;
    if signed_in.as_ref().is_some_and(|u| u.id == user_id) {
        tracing::info!(user_id, stories = catalogue.stories.len(), "Resuming session");
        return Session::resume(state.db.clone(), catalogue).await;
    }

    let user = match state.db.get_user_profile(user_id).await? {
        Some(profile) => SessionUser {
            id: profile.id,
            name: profile.name,
            email: profile.email,
        },
        None => SessionUser {
            id: user_id.to_string(),
            name: user_id.to_string(),
            email: String::new(),
        },
    };
    tracing::info!(user_id, stories = catalogue.stories.len(), "Opening session");
    Session::open(state.db.clone(), user, catalogue).await
}

async fn session_for<'a>(
    state: &AppState,
    sessions: &'a mut SessionPool,
    user_id: &str,
) -> Result<&'a mut Session, AppError> {
    if !sessions.contains(user_id) {
        let session = open_session(state, user_id).await?;
        sessions.insert(user_id, session);
        tracing::debug!(user_id, open = sessions.len(), "Session added to pool");
    }
    sessions
        .get_mut(user_id)
        .ok_or_else(|| AppError::Internal(format!("Session for {} vanished", user_id)))
}

/// The story an action writes, if the acting user owns it.
fn owned_story_target(session: &Session, user_id: &str, action: &Action) -> Option<String> {
    let owns = |story_id: &str| {
        session
            .state()
            .story(story_id)
            .is_some_and(|s| s.author_id == user_id)
    };
    match action {
        Action::AddStory(story) if story.author_id.is_empty() || story.author_id == user_id => {
            Some(story.id.clone())
        }
        Action::UpdateStory(patch) if owns(&patch.id) => Some(patch.id.clone()),
        Action::DeleteStory(story_id) if owns(story_id) => Some(story_id.clone()),
        _ => None,
    }
}

/// GET /api/sessions/:user_id - Open or fetch the user's session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<SessionSnapshot> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let mut sessions = state.sessions.lock().await;
        let session = session_for(&state, &mut sessions, &user_id).await?;
        Ok::<_, AppError>(SessionSnapshot::from(session.state()))
    }
    .await;
    reply(&state, result).await
}

/// POST /api/sessions/:user_id/actions - Dispatch one action.
pub async fn dispatch_action(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(action): Json<Action>,
) -> ApiResult<SessionSnapshot> {
    let result = async {
        require_acting_user(&headers, &user_id)?;
        let claimed = match &action {
            Action::SetUser(Some(user)) => Some(&user.id),
            Action::LoadData(catalogue) => catalogue.user.as_ref().map(|u| &u.id),
            _ => None,
        };
        if let Some(claimed) = claimed.filter(|id| **id != user_id) {
            return Err(AppError::Forbidden(format!(
                "Session of {} cannot sign in as {}",
                user_id, claimed
            )));
        }

        let mut sessions = state.sessions.lock().await;
        let session = session_for(&state, &mut sessions, &user_id).await?;
        let target = owned_story_target(session, &user_id, &action);
        session.dispatch(action).await?;

        if let Some(story_id) = target {
            let indexed = match session.state().story(&story_id) {
                Some(story) => state.search.index_story(story).await,
                None => state.search.remove_story(&story_id).await,
            };
            if let Err(e) = indexed {
                tracing::warn!("Failed to sync story {} with index: {}", story_id, e);
            }
        }

        Ok(SessionSnapshot::from(session.state()))
    }
    .await;
    reply(&state, result).await
}
