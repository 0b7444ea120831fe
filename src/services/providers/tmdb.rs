//! TMDb API provider
//!
//! Thin client over the TMDb v3 REST API. Every endpoint response is cached
//! in Redis with a TTL matched to how quickly the underlying list churns:
//! trending hourly-ish, top-rated barely at all.

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{TmdbGenre, TmdbGenreList, TmdbMovie, TmdbPage},
    services::providers::CatalogProvider,
};

const TRENDING_TTL: u64 = 3_600; // 1 hour
const POPULAR_TTL: u64 = 7_200; // 2 hours
const TOP_RATED_TTL: u64 = 14_400; // 4 hours
const UPCOMING_TTL: u64 = 21_600; // 6 hours
const SEARCH_TTL: u64 = 1_800; // 30 minutes
const DETAILS_TTL: u64 = 86_400; // 24 hours
const GENRES_TTL: u64 = 86_400; // 24 hours

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

impl TmdbProvider {
    pub fn new(cache: Cache, api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            cache,
        }
    }

    /// Issues one GET against the TMDb API and deserializes the body
    ///
    /// Non-2xx statuses surface as UpstreamUnavailable so callers can decide
    /// whether stale mirror data is an acceptable fallback.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}/{}", self.api_url, endpoint);

        let mut query: Vec<(&str, String)> = vec![("api_key", self.api_key.clone())];
        query.extend(params.iter().cloned());

        let response = self.http_client.get(&url).query(&query).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "TMDb has no resource at {}",
                endpoint
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "TMDb returned status {}: {}",
                status, body
            )));
        }

        let value = response.json::<T>().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse TMDb response: {}", e))
        })?;

        Ok(value)
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        key: CacheKey,
        ttl: u64,
        page: i32,
    ) -> AppResult<TmdbPage> {
        cached!(self.cache, key, ttl, async move {
            let page: TmdbPage = self
                .get_json(endpoint, &[("page", page.to_string())])
                .await?;

            tracing::info!(
                endpoint = endpoint,
                results = page.results.len(),
                provider = "tmdb",
                "Catalog page fetched"
            );

            Ok::<_, AppError>(page)
        })
    }
}

#[async_trait::async_trait]
impl CatalogProvider for TmdbProvider {
    async fn trending(&self, page: i32) -> AppResult<TmdbPage> {
        self.fetch_page(
            "trending/movie/week",
            CacheKey::Trending(page),
            TRENDING_TTL,
            page,
        )
        .await
    }

    async fn popular(&self, page: i32) -> AppResult<TmdbPage> {
        self.fetch_page("movie/popular", CacheKey::Popular(page), POPULAR_TTL, page)
            .await
    }

    async fn top_rated(&self, page: i32) -> AppResult<TmdbPage> {
        self.fetch_page(
            "movie/top_rated",
            CacheKey::TopRated(page),
            TOP_RATED_TTL,
            page,
        )
        .await
    }

    async fn upcoming(&self, page: i32) -> AppResult<TmdbPage> {
        self.fetch_page(
            "movie/upcoming",
            CacheKey::Upcoming(page),
            UPCOMING_TTL,
            page,
        )
        .await
    }

    async fn search(
        &self,
        query: &str,
        page: i32,
        include_adult: bool,
        year: Option<i32>,
    ) -> AppResult<TmdbPage> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let key = CacheKey::Search {
            query: format!("{}:{}:{:?}", query, include_adult, year),
            page,
        };

        cached!(self.cache, key, SEARCH_TTL, async move {
            let mut params = vec![
                ("query", query.to_string()),
                ("page", page.to_string()),
                ("include_adult", include_adult.to_string()),
            ];
            if let Some(year) = year {
                params.push(("year", year.to_string()));
            }

            let results: TmdbPage = self.get_json("search/movie", &params).await?;

            tracing::info!(
                query = %query,
                results = results.results.len(),
                provider = "tmdb",
                "Movie search completed"
            );

            Ok::<_, AppError>(results)
        })
    }

    async fn movie_details(&self, tmdb_id: i64) -> AppResult<TmdbMovie> {
        cached!(
            self.cache,
            CacheKey::MovieDetails(tmdb_id),
            DETAILS_TTL,
            async move {
                let movie: TmdbMovie = self.get_json(&format!("movie/{}", tmdb_id), &[]).await?;

                tracing::info!(tmdb_id = tmdb_id, provider = "tmdb", "Movie details fetched");

                Ok::<_, AppError>(movie)
            }
        )
    }

    async fn genres(&self) -> AppResult<Vec<TmdbGenre>> {
        cached!(self.cache, CacheKey::GenreList, GENRES_TTL, async move {
            let list: TmdbGenreList = self.get_json("genre/movie/list", &[]).await?;

            tracing::info!(
                genres = list.genres.len(),
                provider = "tmdb",
                "Genre list fetched"
            );

            Ok::<_, AppError>(list.genres)
        })
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
