//! Recommendation assembly: candidate generation, scoring, and the shared
//! post-scoring pipeline.
//!
//! The assembler reads a snapshot of mirror and interaction data and never
//! writes anything except the audit records for emitted suggestions. It is
//! constructed once at startup with explicit store handles.

pub mod scoring;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Account, Movie, Preferences, Profile, RecommendationMode, RecommendationParams,
        ScoredMovie,
    },
    services::{
        catalog::{CatalogStore, MovieFilters, Page, SortKey},
        interactions::InteractionStore,
    },
};

/// How many of the account's top movies seed genre derivation and
/// content-based matching
const SEED_MOVIE_COUNT: usize = 5;

/// The requesting account as the assembler sees it
///
/// Flattened from the account, preferences, and profile records so the
/// assembler does not depend on the account service.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub account_id: Uuid,
    pub include_adult_content: bool,
    pub diversity: f64,
    pub favorite_genre_ids: Vec<i64>,
}

impl Viewer {
    pub fn from_parts(account: &Account, preferences: &Preferences, profile: &Profile) -> Self {
        Self {
            account_id: account.id,
            include_adult_content: preferences.include_adult_content,
            diversity: preferences.recommendation_diversity,
            favorite_genre_ids: profile.favorite_genre_ids.clone(),
        }
    }
}

/// Builds ordered recommendation lists over the catalog mirror and the
/// interaction store
pub struct RecommendationAssembler {
    catalog: Arc<dyn CatalogStore>,
    interactions: Arc<dyn InteractionStore>,
}

impl RecommendationAssembler {
    pub fn new(catalog: Arc<dyn CatalogStore>, interactions: Arc<dyn InteractionStore>) -> Self {
        Self {
            catalog,
            interactions,
        }
    }

    /// Produces an ordered, deduplicated, filtered recommendation list
    ///
    /// Anonymous callers may use the catalog-delegated modes and `similar`;
    /// the personalized modes fail with Unauthorized. Empty candidate sets
    /// after filtering are an empty list, not an error. When a viewer is
    /// present, every emitted (account, movie) pair is persisted for
    /// click-through measurement.
    pub async fn recommend(
        &self,
        viewer: Option<&Viewer>,
        mode: RecommendationMode,
        params: RecommendationParams,
    ) -> AppResult<Vec<ScoredMovie>> {
        params.validate()?;

        if mode.requires_account() && viewer.is_none() {
            return Err(AppError::Unauthorized(format!(
                "Mode '{}' requires an authenticated account",
                mode.as_str()
            )));
        }

        // Over-provision candidates so post-filtering can still fill a page
        let pool = Page {
            number: 1,
            size: ((params.page_size * 5).min(100)) as u32,
        };
        let include_adult = viewer.map(|v| v.include_adult_content).unwrap_or(false);

        // Collaborative filtering needs at least one favorite or rating to
        // find neighbors; cold accounts fall back to the popular list.
        let mode = self.resolve_fallback(viewer, mode).await?;

        let mut candidates = match mode {
            RecommendationMode::Trending
            | RecommendationMode::Popular
            | RecommendationMode::TopRated
            | RecommendationMode::Upcoming => {
                self.catalog_candidates(mode, include_adult, pool).await?
            }
            RecommendationMode::GenreBased => {
                self.genre_based_candidates(viewer.expect("account checked"), include_adult, pool)
                    .await?
            }
            RecommendationMode::Collaborative => {
                self.collaborative_candidates(viewer.expect("account checked"))
                    .await?
            }
            RecommendationMode::ContentBased => {
                self.content_based_candidates(viewer.expect("account checked"), include_adult, pool)
                    .await?
            }
            RecommendationMode::Similar { seed } => {
                self.similar_candidates(seed, include_adult, pool).await?
            }
        };

        // Shared pipeline: suppress interacted, drop adult, rank, thin
        // clusters, truncate, audit.
        if let Some(viewer) = viewer {
            if !params.include_interacted {
                let interacted = self.interactions.interacted_ids(viewer.account_id).await?;
                candidates.retain(|c| !interacted.contains(&c.movie.tmdb_id));
            }
        }

        if !include_adult {
            candidates.retain(|c| !c.movie.adult);
        }

        scoring::sort_candidates(&mut candidates);

        let diversity = viewer.map(|v| v.diversity).unwrap_or(0.0);
        scoring::apply_diversity(&mut candidates, diversity, params.page_size);

        candidates.truncate(params.page_size);

        if let Some(viewer) = viewer {
            let scored: Vec<(i64, f64)> = candidates
                .iter()
                .map(|c| (c.movie.tmdb_id, c.score))
                .collect();
            self.interactions
                .record_recommendations(viewer.account_id, mode.as_str(), &scored)
                .await?;
        }

        tracing::info!(
            mode = mode.as_str(),
            results = candidates.len(),
            anonymous = viewer.is_none(),
            "Recommendations assembled"
        );

        Ok(candidates)
    }

    /// Swaps collaborative mode for popular when the account has no
    /// favorites or ratings to correlate on
    async fn resolve_fallback(
        &self,
        viewer: Option<&Viewer>,
        mode: RecommendationMode,
    ) -> AppResult<RecommendationMode> {
        if mode != RecommendationMode::Collaborative {
            return Ok(mode);
        }
        let viewer = viewer.expect("account checked");

        let has_favorites = !self
            .interactions
            .list_favorites(viewer.account_id)
            .await?
            .is_empty();
        let has_ratings = !self
            .interactions
            .list_ratings(viewer.account_id)
            .await?
            .is_empty();

        if has_favorites || has_ratings {
            Ok(RecommendationMode::Collaborative)
        } else {
            tracing::debug!(
                account_id = %viewer.account_id,
                "No interactions for collaborative mode, falling back to popular"
            );
            Ok(RecommendationMode::Popular)
        }
    }

    /// Modes whose ordering is delegated to the mirror's upstream metrics
    async fn catalog_candidates(
        &self,
        mode: RecommendationMode,
        include_adult: bool,
        pool: Page,
    ) -> AppResult<Vec<ScoredMovie>> {
        let today = Utc::now().date_naive();

        let (filters, sort) = match mode {
            RecommendationMode::Trending => (
                MovieFilters {
                    // Recent releases only; an old catalog entry with high
                    // popularity is "popular", not "trending"
                    released_after: Some(today - Duration::days(365)),
                    include_adult,
                    ..Default::default()
                },
                SortKey::Popularity,
            ),
            RecommendationMode::Popular => (
                MovieFilters {
                    include_adult,
                    ..Default::default()
                },
                SortKey::Popularity,
            ),
            RecommendationMode::TopRated => (
                MovieFilters {
                    include_adult,
                    ..Default::default()
                },
                SortKey::Rating,
            ),
            RecommendationMode::Upcoming => (
                MovieFilters {
                    released_after: Some(today - Duration::days(1)),
                    include_adult,
                    ..Default::default()
                },
                // Soonest first, so the pool cap cannot cut off the releases
                // the recency score ranks highest
                SortKey::ReleaseDateAsc,
            ),
            _ => unreachable!("not a catalog-delegated mode"),
        };

        let movies = self.catalog.list(&filters, sort, pool).await?;

        let mut candidates: Vec<ScoredMovie> = movies
            .into_iter()
            .map(|movie| {
                let score = match mode {
                    RecommendationMode::TopRated => scoring::rating_score(movie.vote_average),
                    RecommendationMode::Upcoming => {
                        scoring::recency_score(movie.release_date, today)
                    }
                    _ => movie.popularity,
                };
                ScoredMovie { movie, score }
            })
            .collect();

        // Raw popularity is unbounded; bring it into [0, 1] for the audit trail
        if matches!(
            mode,
            RecommendationMode::Trending | RecommendationMode::Popular
        ) {
            scoring::normalize_scores(&mut candidates);
        }

        Ok(candidates)
    }

    /// Candidates intersecting the declared (or derived) favorite genres,
    /// scored by how many of those genres they match
    async fn genre_based_candidates(
        &self,
        viewer: &Viewer,
        include_adult: bool,
        pool: Page,
    ) -> AppResult<Vec<ScoredMovie>> {
        let declared = self.declared_or_derived_genres(viewer).await?;
        if declared.is_empty() {
            return Ok(Vec::new());
        }

        let reference: HashSet<i64> = declared.iter().copied().collect();
        let movies = self
            .catalog
            .list(
                &MovieFilters {
                    genre_ids: declared.clone(),
                    include_adult,
                    ..Default::default()
                },
                SortKey::Popularity,
                pool,
            )
            .await?;

        let candidates = movies
            .into_iter()
            .map(|movie| {
                let overlap = scoring::genre_overlap(&movie.genre_ids(), &reference);
                ScoredMovie {
                    movie,
                    score: overlap as f64 / declared.len() as f64,
                }
            })
            .collect();

        Ok(candidates)
    }

    /// Declared favorite genres, or the genres of the account's top seed
    /// movies when nothing is declared
    async fn declared_or_derived_genres(&self, viewer: &Viewer) -> AppResult<Vec<i64>> {
        if !viewer.favorite_genre_ids.is_empty() {
            return Ok(viewer.favorite_genre_ids.clone());
        }

        let seed_ids = self.seed_movie_ids(viewer.account_id).await?;
        let seed_movies = self.catalog.movies_by_ids(&seed_ids).await?;

        let derived: BTreeSet<i64> = seed_movies
            .iter()
            .flat_map(|m| m.genre_ids())
            .collect();
        Ok(derived.into_iter().collect())
    }

    /// The account's highest-rated movies first, then recent favorites,
    /// capped at SEED_MOVIE_COUNT
    async fn seed_movie_ids(&self, account_id: Uuid) -> AppResult<Vec<i64>> {
        let mut ratings = self.interactions.list_ratings(account_id).await?;
        ratings.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.movie_id.cmp(&b.movie_id))
        });

        let mut seeds: Vec<i64> = Vec::new();
        for rating in &ratings {
            if seeds.len() >= SEED_MOVIE_COUNT {
                break;
            }
            if !seeds.contains(&rating.movie_id) {
                seeds.push(rating.movie_id);
            }
        }

        if seeds.len() < SEED_MOVIE_COUNT {
            for favorite in self.interactions.list_favorites(account_id).await? {
                if seeds.len() >= SEED_MOVIE_COUNT {
                    break;
                }
                if !seeds.contains(&favorite.movie_id) {
                    seeds.push(favorite.movie_id);
                }
            }
        }

        Ok(seeds)
    }

    /// Movies liked by accounts sharing interactions with the viewer,
    /// scored by neighbor count
    async fn collaborative_candidates(&self, viewer: &Viewer) -> AppResult<Vec<ScoredMovie>> {
        let pairs = self.interactions.co_occurrence(viewer.account_id).await?;
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = pairs.iter().map(|(id, _)| *id).collect();
        let counts: HashMap<i64, i64> = pairs.into_iter().collect();
        let movies = self.catalog.movies_by_ids(&ids).await?;

        let mut candidates: Vec<ScoredMovie> = movies
            .into_iter()
            .map(|movie| {
                let score = counts.get(&movie.tmdb_id).copied().unwrap_or(0) as f64;
                ScoredMovie { movie, score }
            })
            .collect();

        scoring::normalize_scores(&mut candidates);
        Ok(candidates)
    }

    /// Candidates sharing genres with the account's seed movies, scored by
    /// weighted genre overlap
    async fn content_based_candidates(
        &self,
        viewer: &Viewer,
        include_adult: bool,
        pool: Page,
    ) -> AppResult<Vec<ScoredMovie>> {
        let seed_ids = self.seed_movie_ids(viewer.account_id).await?;
        let seed_movies = self.catalog.movies_by_ids(&seed_ids).await?;

        // Each genre weighs by how many seed movies carry it
        let mut weights: HashMap<i64, usize> = HashMap::new();
        for movie in &seed_movies {
            for genre_id in movie.genre_ids() {
                *weights.entry(genre_id).or_insert(0) += 1;
            }
        }
        if weights.is_empty() {
            return Ok(Vec::new());
        }
        let total_weight: usize = weights.values().sum();

        let mut genre_ids: Vec<i64> = weights.keys().copied().collect();
        genre_ids.sort_unstable();

        let seed_id_set: HashSet<i64> = seed_ids.into_iter().collect();
        let movies = self
            .catalog
            .list(
                &MovieFilters {
                    genre_ids,
                    include_adult,
                    ..Default::default()
                },
                SortKey::Popularity,
                pool,
            )
            .await?;

        let candidates = movies
            .into_iter()
            .filter(|movie| !seed_id_set.contains(&movie.tmdb_id))
            .map(|movie| {
                let matched: usize = movie
                    .genre_ids()
                    .iter()
                    .filter_map(|id| weights.get(id))
                    .sum();
                ScoredMovie {
                    movie,
                    score: matched as f64 / total_weight as f64,
                }
            })
            .collect();

        Ok(candidates)
    }

    /// Candidates sharing at least one genre with the seed, excluding the
    /// seed itself
    async fn similar_candidates(
        &self,
        seed: i64,
        include_adult: bool,
        pool: Page,
    ) -> AppResult<Vec<ScoredMovie>> {
        let seed_movie: Movie = self.catalog.get(seed).await?;
        let seed_genres: HashSet<i64> = seed_movie.genre_ids().into_iter().collect();
        if seed_genres.is_empty() {
            return Ok(Vec::new());
        }

        let mut genre_ids: Vec<i64> = seed_genres.iter().copied().collect();
        genre_ids.sort_unstable();

        let movies = self
            .catalog
            .list(
                &MovieFilters {
                    genre_ids,
                    include_adult,
                    ..Default::default()
                },
                SortKey::Popularity,
                pool,
            )
            .await?;

        let candidates = movies
            .into_iter()
            .filter(|movie| movie.tmdb_id != seed)
            .map(|movie| {
                let overlap = scoring::genre_overlap(&movie.genre_ids(), &seed_genres);
                ScoredMovie {
                    movie,
                    score: overlap as f64 / seed_genres.len() as f64,
                }
            })
            .collect();

        Ok(candidates)
    }
}
