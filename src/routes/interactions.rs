use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::AppResult,
    middleware::auth::{client_meta, CurrentUser},
    models::{ActivityKind, Movie},
    services::interactions::NewActivity,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct MovieRef {
    pub movie_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ListedEntry {
    pub movie: Movie,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RatingEntry {
    pub movie: Movie,
    pub score: f64,
    pub review: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Joins interaction rows with their mirrored movies, dropping rows whose
/// movie has left the mirror
async fn resolve_movies(state: &AppState, ids: &[i64]) -> AppResult<HashMap<i64, Movie>> {
    let movies = state.catalog.movies_by_ids(ids).await?;
    Ok(movies.into_iter().map(|m| (m.tmdb_id, m)).collect())
}

async fn log_interaction(
    state: &AppState,
    headers: &HeaderMap,
    account_id: uuid::Uuid,
    kind: ActivityKind,
    movie_id: i64,
) {
    let (ip, user_agent) = client_meta(headers);
    let event = NewActivity::new(account_id, kind)
        .with_movie(movie_id)
        .with_client(ip, user_agent);
    if let Err(e) = state.interactions.record_activity(event).await {
        tracing::warn!(error = %e, "Failed to record interaction activity");
    }
}

// Favorites

pub async fn list_favorites(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Vec<ListedEntry>>> {
    let favorites = state.interactions.list_favorites(account.id).await?;
    let ids: Vec<i64> = favorites.iter().map(|f| f.movie_id).collect();
    let mut movies = resolve_movies(&state, &ids).await?;

    let entries = favorites
        .into_iter()
        .filter_map(|f| {
            movies.remove(&f.movie_id).map(|movie| ListedEntry {
                movie,
                added_at: f.added_at,
            })
        })
        .collect();
    Ok(Json(entries))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    headers: HeaderMap,
    Json(body): Json<MovieRef>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    // Lazily mirror the movie so favoriting works straight from search results
    state.sync.ensure_movie(body.movie_id).await?;
    state
        .interactions
        .add_favorite(account.id, body.movie_id)
        .await?;

    log_interaction(
        &state,
        &headers,
        account.id,
        ActivityKind::AddFavorite,
        body.movie_id,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "movie_id": body.movie_id })),
    ))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    headers: HeaderMap,
    Path(tmdb_id): Path<i64>,
) -> AppResult<StatusCode> {
    state
        .interactions
        .remove_favorite(account.id, tmdb_id)
        .await?;

    log_interaction(
        &state,
        &headers,
        account.id,
        ActivityKind::RemoveFavorite,
        tmdb_id,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

// Ratings

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub movie_id: i64,
    pub score: f64,
    pub review: Option<String>,
}

pub async fn list_ratings(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Vec<RatingEntry>>> {
    let ratings = state.interactions.list_ratings(account.id).await?;
    let ids: Vec<i64> = ratings.iter().map(|r| r.movie_id).collect();
    let mut movies = resolve_movies(&state, &ids).await?;

    let entries = ratings
        .into_iter()
        .filter_map(|r| {
            movies.remove(&r.movie_id).map(|movie| RatingEntry {
                movie,
                score: r.score,
                review: r.review,
                updated_at: r.updated_at,
            })
        })
        .collect();
    Ok(Json(entries))
}

pub async fn rate_movie(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    headers: HeaderMap,
    Json(body): Json<RateRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.sync.ensure_movie(body.movie_id).await?;
    let rating = state
        .interactions
        .rate(account.id, body.movie_id, body.score, body.review)
        .await?;

    log_interaction(
        &state,
        &headers,
        account.id,
        ActivityKind::RateMovie,
        body.movie_id,
    )
    .await;

    Ok(Json(json!({
        "movie_id": rating.movie_id,
        "score": rating.score,
        "review": rating.review,
    })))
}

pub async fn delete_rating(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Path(tmdb_id): Path<i64>,
) -> AppResult<StatusCode> {
    state
        .interactions
        .delete_rating(account.id, tmdb_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Watchlist

pub async fn list_watchlist(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Vec<ListedEntry>>> {
    let items = state.interactions.list_watchlist(account.id).await?;
    let ids: Vec<i64> = items.iter().map(|w| w.movie_id).collect();
    let mut movies = resolve_movies(&state, &ids).await?;

    let entries = items
        .into_iter()
        .filter_map(|w| {
            movies.remove(&w.movie_id).map(|movie| ListedEntry {
                movie,
                added_at: w.added_at,
            })
        })
        .collect();
    Ok(Json(entries))
}

pub async fn add_to_watchlist(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    headers: HeaderMap,
    Json(body): Json<MovieRef>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    state.sync.ensure_movie(body.movie_id).await?;
    state
        .interactions
        .add_to_watchlist(account.id, body.movie_id)
        .await?;

    log_interaction(
        &state,
        &headers,
        account.id,
        ActivityKind::AddWatchlist,
        body.movie_id,
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "movie_id": body.movie_id })),
    ))
}

pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    headers: HeaderMap,
    Path(tmdb_id): Path<i64>,
) -> AppResult<StatusCode> {
    state
        .interactions
        .remove_from_watchlist(account.id, tmdb_id)
        .await?;

    log_interaction(
        &state,
        &headers,
        account.id,
        ActivityKind::RemoveWatchlist,
        tmdb_id,
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
