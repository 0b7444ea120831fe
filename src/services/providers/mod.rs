//! Catalog data provider abstraction
//!
//! The mirror is fed from a third-party movie catalog. Keeping the upstream
//! behind a trait lets the sync task and the handlers run against a test
//! double, and leaves room for a second catalog source later.

use crate::{
    error::AppResult,
    models::{TmdbGenre, TmdbMovie, TmdbPage},
};

pub mod tmdb;

pub use tmdb::TmdbProvider;

/// Trait for upstream movie catalog providers
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Movies trending this week
    async fn trending(&self, page: i32) -> AppResult<TmdbPage>;

    /// Movies ordered by upstream popularity
    async fn popular(&self, page: i32) -> AppResult<TmdbPage>;

    /// Movies ordered by upstream user rating
    async fn top_rated(&self, page: i32) -> AppResult<TmdbPage>;

    /// Movies with upcoming release dates
    async fn upcoming(&self, page: i32) -> AppResult<TmdbPage>;

    /// Free-text movie search
    async fn search(
        &self,
        query: &str,
        page: i32,
        include_adult: bool,
        year: Option<i32>,
    ) -> AppResult<TmdbPage>;

    /// Full metadata for a single movie, including nested genres
    async fn movie_details(&self, tmdb_id: i64) -> AppResult<TmdbMovie>;

    /// The upstream genre reference set
    async fn genres(&self) -> AppResult<Vec<TmdbGenre>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
