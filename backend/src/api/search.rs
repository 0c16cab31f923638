//! Search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::Story;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    #[serde(default)]
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub story: Story,
    pub score: f32,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

const MAX_QUERY_CHARS: usize = 256;

/// GET /api/search - Search published stories.
pub async fn search_stories(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let revision_id = state.db.revision().await.unwrap_or(0);

    if params.q.chars().count() > MAX_QUERY_CHARS {
        return error(
            AppError::BadRequest(format!(
                "Search query must be at most {} characters",
                MAX_QUERY_CHARS
            )),
            revision_id,
        );
    }

    let limit = params.limit.min(MAX_SEARCH_LIMIT);

    let hits = match state.search.search(&params.q, limit, params.offset) {
        Ok(hits) => hits,
        Err(e) => return error(e, revision_id),
    };

    // Hits for stories deleted since indexing are skipped
    let mut results = Vec::new();
    for hit in hits {
        match state.db.get_user_story(&hit.author_id, &hit.story_id).await {
            Ok(Some(story)) => results.push(SearchResultItem {
                story,
                score: hit.score,
            }),
            Ok(None) => {}
            Err(e) => return error(e, revision_id),
        }
    }

    let total = results.len();

    success(
        SearchResponse {
            results,
            total,
            limit,
            offset: params.offset,
        },
        revision_id,
    )
}
