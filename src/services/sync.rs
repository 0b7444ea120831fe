//! Mirror refresh: periodic bulk sync from the upstream catalog plus lazy
//! single-movie fetch.
//!
//! Refresh runs out-of-band from request serving and never blocks readers.
//! An unreachable upstream leaves the mirror stale-but-available; failures
//! are logged, not propagated, unless a caller asks for a movie that is
//! neither mirrored nor fetchable.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{Movie, TmdbPage},
    services::{
        catalog::CatalogStore, interactions::InteractionStore, providers::CatalogProvider,
    },
};

/// Pages pulled per list on each refresh run, mirroring how deep users
/// actually browse each list
const POPULAR_PAGES: i32 = 5;
const TOP_RATED_PAGES: i32 = 5;
const UPCOMING_PAGES: i32 = 3;

#[derive(Clone)]
pub struct CatalogSync {
    provider: Arc<dyn CatalogProvider>,
    catalog: Arc<dyn CatalogStore>,
}

impl CatalogSync {
    pub fn new(provider: Arc<dyn CatalogProvider>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { provider, catalog }
    }

    /// Syncs the upstream genre reference set into the mirror
    pub async fn sync_genres(&self) -> AppResult<usize> {
        let genres = self.provider.genres().await?;
        for genre in &genres {
            self.catalog.upsert_genre(genre).await?;
        }

        tracing::info!(genres = genres.len(), "Genres synced");
        Ok(genres.len())
    }

    /// Upserts every movie in one provider page; per-movie failures are
    /// logged and skipped so one bad payload cannot sink the batch
    pub async fn sync_page(&self, page: &TmdbPage) -> usize {
        let mut synced = 0;
        for movie in &page.results {
            match self.catalog.upsert(movie).await {
                Ok(()) => synced += 1,
                Err(e) => {
                    tracing::error!(tmdb_id = movie.id, error = %e, "Failed to sync movie");
                }
            }
        }
        synced
    }

    /// One full refresh pass over genres and the browse lists
    ///
    /// Each list is fetched independently; an upstream failure on one list
    /// keeps whatever the mirror already has and moves on.
    pub async fn refresh_all(&self) {
        tracing::info!("Catalog refresh started");

        if let Err(e) = self.sync_genres().await {
            tracing::warn!(error = %e, "Genre sync failed, keeping cached genres");
        }

        let mut total = 0;
        total += self.sync_list("trending", 1).await;
        for page in 1..=POPULAR_PAGES {
            total += self.sync_list("popular", page).await;
        }
        for page in 1..=TOP_RATED_PAGES {
            total += self.sync_list("top_rated", page).await;
        }
        for page in 1..=UPCOMING_PAGES {
            total += self.sync_list("upcoming", page).await;
        }

        tracing::info!(movies = total, "Catalog refresh finished");
    }

    async fn sync_list(&self, list: &str, page: i32) -> usize {
        let result = match list {
            "trending" => self.provider.trending(page).await,
            "popular" => self.provider.popular(page).await,
            "top_rated" => self.provider.top_rated(page).await,
            "upcoming" => self.provider.upcoming(page).await,
            other => unreachable!("unknown list '{}'", other),
        };

        match result {
            Ok(data) => self.sync_page(&data).await,
            Err(e) => {
                tracing::warn!(list = list, page = page, error = %e, "List fetch failed, serving stale mirror data");
                0
            }
        }
    }

    /// Searches the upstream catalog, mirrors the hits, and returns the
    /// mirrored rows in upstream relevance order
    pub async fn search(
        &self,
        query: &str,
        page: i32,
        include_adult: bool,
        year: Option<i32>,
    ) -> AppResult<(TmdbPage, Vec<Movie>)> {
        let results = self.provider.search(query, page, include_adult, year).await?;
        self.sync_page(&results).await;

        let ids: Vec<i64> = results.results.iter().map(|m| m.id).collect();
        let movies = self.catalog.movies_by_ids(&ids).await?;
        Ok((results, movies))
    }

    /// Returns the mirrored movie, fetching it from upstream on a miss
    ///
    /// Upstream errors only surface when the mirror has nothing to serve.
    pub async fn ensure_movie(&self, tmdb_id: i64) -> AppResult<Movie> {
        match self.catalog.get(tmdb_id).await {
            Ok(movie) => Ok(movie),
            Err(AppError::NotFound(_)) => {
                let details = self.provider.movie_details(tmdb_id).await?;
                self.catalog.upsert(&details).await?;
                self.catalog.get(tmdb_id).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Spawns the fixed-interval refresh-and-prune loop
///
/// The first tick fires immediately so a fresh deployment has catalog data
/// before the first request needs it.
pub fn spawn_refresh_task(
    sync: CatalogSync,
    interactions: Arc<dyn InteractionStore>,
    config: Config,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.catalog_refresh_interval_secs));

        loop {
            interval.tick().await;

            sync.refresh_all().await;

            let rec_cutoff =
                Utc::now() - chrono::Duration::days(config.recommendation_retention_days);
            match interactions.prune_recommendations(rec_cutoff).await {
                Ok(count) if count > 0 => {
                    tracing::info!(pruned = count, "Old recommendation records pruned");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Recommendation pruning failed"),
            }

            let activity_cutoff =
                Utc::now() - chrono::Duration::days(config.activity_retention_days);
            match interactions.prune_activity(activity_cutoff).await {
                Ok(count) if count > 0 => {
                    tracing::info!(pruned = count, "Old activity events pruned");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Activity pruning failed"),
            }
        }
    })
}
