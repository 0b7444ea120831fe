use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::{client_meta, MaybeUser, StaffUser},
    models::{ActivityKind, Genre, Movie},
    services::{
        catalog::{MovieFilters, Page, SortKey},
        interactions::NewActivity,
    },
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct MovieListQuery {
    /// Comma-separated genre ids
    pub genres: Option<String>,
    pub year: Option<i32>,
    pub min_rating: Option<f64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MovieListResponse {
    pub page: u32,
    pub results: Vec<Movie>,
}

fn parse_genre_ids(raw: Option<&str>) -> AppResult<Vec<i64>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| AppError::InvalidInput(format!("Invalid genre id '{}'", part.trim())))
        })
        .collect()
}

/// Handler for browsing the mirrored catalog with filters and sorting
pub async fn list_movies(
    State(state): State<AppState>,
    MaybeUser(account): MaybeUser,
    Query(query): Query<MovieListQuery>,
) -> AppResult<Json<MovieListResponse>> {
    let include_adult = match &account {
        Some(account) => {
            state
                .accounts
                .get_preferences(account.id)
                .await?
                .include_adult_content
        }
        None => false,
    };

    let filters = MovieFilters {
        genre_ids: parse_genre_ids(query.genres.as_deref())?,
        year: query.year,
        min_rating: query.min_rating,
        search: query.search,
        released_after: None,
        include_adult,
    };
    let sort = match query.sort_by.as_deref() {
        Some(key) => SortKey::parse(key)?,
        None => SortKey::Popularity,
    };
    let page = Page {
        number: query.page.unwrap_or(1),
        size: query.page_size.unwrap_or(20),
    };

    let results = state.catalog.list(&filters, sort, page).await?;
    Ok(Json(MovieListResponse {
        page: page.number,
        results,
    }))
}

/// Handler for a single movie; misses are fetched from upstream on demand
pub async fn get_movie(
    State(state): State<AppState>,
    MaybeUser(account): MaybeUser,
    headers: HeaderMap,
    Path(tmdb_id): Path<i64>,
) -> AppResult<Json<Movie>> {
    let movie = state.sync.ensure_movie(tmdb_id).await?;

    if let Some(account) = account {
        let (ip, user_agent) = client_meta(&headers);
        let event = NewActivity::new(account.id, ActivityKind::ViewMovie)
            .with_movie(movie.tmdb_id)
            .with_client(ip, user_agent);
        if let Err(e) = state.interactions.record_activity(event).await {
            tracing::warn!(error = %e, "Failed to record view activity");
        }
    }

    Ok(Json(movie))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub page: Option<i32>,
    pub include_adult: Option<bool>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub page: i32,
    pub total_pages: i32,
    pub total_results: i64,
    pub results: Vec<Movie>,
}

/// Handler for upstream catalog search; hits are mirrored as a side effect
pub async fn search_movies(
    State(state): State<AppState>,
    MaybeUser(account): MaybeUser,
    headers: HeaderMap,
    Json(body): Json<SearchRequest>,
) -> AppResult<Json<SearchResponse>> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(AppError::InvalidInput("Search query is empty".to_string()));
    }

    let page = body.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::InvalidInput("page must be at least 1".to_string()));
    }

    let (upstream, results) = state
        .sync
        .search(query, page, body.include_adult.unwrap_or(false), body.year)
        .await?;

    if let Some(account) = account {
        let (ip, user_agent) = client_meta(&headers);
        let event = NewActivity::new(account.id, ActivityKind::Search)
            .with_metadata(json!({ "query": query, "results": upstream.total_results }))
            .with_client(ip, user_agent);
        if let Err(e) = state.interactions.record_activity(event).await {
            tracing::warn!(error = %e, "Failed to record search activity");
        }
    }

    Ok(Json(SearchResponse {
        page: upstream.page,
        total_pages: upstream.total_pages,
        total_results: upstream.total_results,
        results,
    }))
}

/// Handler for the mirrored genre reference list
pub async fn list_genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    let genres = state.catalog.list_genres().await?;
    Ok(Json(genres))
}

/// Staff-only handler that forces a genre re-sync from upstream
pub async fn sync_genres(
    State(state): State<AppState>,
    StaffUser(_account): StaffUser,
) -> AppResult<Json<serde_json::Value>> {
    let synced = state.sync.sync_genres().await?;
    Ok(Json(json!({ "synced": synced })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_genres() {
        assert_eq!(
            parse_genre_ids(Some("28, 12,16")).unwrap(),
            vec![28, 12, 16]
        );
    }

    #[test]
    fn missing_genres_param_means_no_filter() {
        assert!(parse_genre_ids(None).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_numeric_genre_ids() {
        assert!(matches!(
            parse_genre_ids(Some("28,action")),
            Err(AppError::InvalidInput(_))
        ));
    }
}
