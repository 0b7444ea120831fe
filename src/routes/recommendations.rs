use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::AppResult,
    middleware::auth::{client_meta, MaybeUser},
    models::{
        Account, ActivityKind, RecommendationMode, RecommendationParams, ScoredMovie,
        DEFAULT_PAGE_SIZE,
    },
    services::{interactions::NewActivity, recommendations::Viewer},
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    /// Recommendation mode, e.g. "trending" or "collaborative"
    #[serde(rename = "type", default = "default_mode")]
    pub mode: String,
    /// Seed movie for the "similar" mode
    pub seed: Option<i64>,
    pub page_size: Option<usize>,
    pub include_interacted: Option<bool>,
}

fn default_mode() -> String {
    "popular".to_string()
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    #[serde(rename = "type")]
    pub mode: String,
    pub results: Vec<ScoredMovie>,
}

/// Handler for the recommendation endpoint
///
/// Anonymous callers get catalog-derived modes only; personalized modes
/// reject them with 401 before any store is touched.
pub async fn recommend(
    State(state): State<AppState>,
    MaybeUser(account): MaybeUser,
    headers: HeaderMap,
    Query(query): Query<RecommendQuery>,
) -> AppResult<Json<RecommendResponse>> {
    let mode = RecommendationMode::parse(&query.mode, query.seed)?;
    let params = RecommendationParams {
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        include_interacted: query.include_interacted.unwrap_or(false),
    };

    let viewer = match &account {
        Some(account) => Some(load_viewer(&state, account).await?),
        None => None,
    };

    let results = state
        .assembler
        .recommend(viewer.as_ref(), mode, params)
        .await?;

    if let Some(account) = account {
        let (ip, user_agent) = client_meta(&headers);
        let event = NewActivity::new(account.id, ActivityKind::ViewRecommendations)
            .with_metadata(json!({ "type": mode.as_str(), "count": results.len() }))
            .with_client(ip, user_agent);
        if let Err(e) = state.interactions.record_activity(event).await {
            tracing::warn!(error = %e, "Failed to record recommendation activity");
        }
    }

    Ok(Json(RecommendResponse {
        mode: mode.as_str().to_string(),
        results,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub page_size: Option<usize>,
    #[serde(default)]
    pub include_interacted: bool,
}

/// Handler for movies similar to a seed movie
///
/// The seed is fetched from upstream on a mirror miss, so any valid TMDB id
/// works; a genuinely unknown id is a 404.
pub async fn similar(
    State(state): State<AppState>,
    MaybeUser(account): MaybeUser,
    Path(tmdb_id): Path<i64>,
    Query(query): Query<SimilarQuery>,
) -> AppResult<Json<RecommendResponse>> {
    state.sync.ensure_movie(tmdb_id).await?;

    let mode = RecommendationMode::Similar { seed: tmdb_id };
    // Same suppression default as /recommendations; opt back in with the
    // include_interacted flag
    let params = RecommendationParams {
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        include_interacted: query.include_interacted,
    };

    let viewer = match &account {
        Some(account) => Some(load_viewer(&state, account).await?),
        None => None,
    };

    let results = state
        .assembler
        .recommend(viewer.as_ref(), mode, params)
        .await?;

    Ok(Json(RecommendResponse {
        mode: mode.as_str().to_string(),
        results,
    }))
}

async fn load_viewer(state: &AppState, account: &Account) -> AppResult<Viewer> {
    let preferences = state.accounts.get_preferences(account.id).await?;
    let profile = state.accounts.get_profile(account.id).await?;
    Ok(Viewer::from_parts(account, &preferences, &profile))
}
