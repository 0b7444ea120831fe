//! In-memory store and provider doubles for exercising the assembler and
//! the HTTP surface without Postgres, Redis, or the upstream catalog.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use cinematch_api::error::{AppError, AppResult};
use cinematch_api::models::{
    ActivityEvent, Favorite, Genre, Movie, Rating, RecommendationRecord, TmdbGenre, TmdbMovie,
    TmdbPage, WatchlistItem,
};
use cinematch_api::services::catalog::{CatalogStore, MovieFilters, Page, SortKey};
use cinematch_api::models::interaction::validate_rating;
use cinematch_api::services::interactions::{InteractionStore, NewActivity};
use cinematch_api::services::providers::CatalogProvider;

/// Builds a mirrored movie with sensible defaults for tests
pub fn movie(tmdb_id: i64, title: &str, popularity: f64, genres: &[(i64, &str)]) -> Movie {
    Movie {
        tmdb_id,
        title: title.to_string(),
        overview: format!("Overview of {}", title),
        release_date: Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
        poster_path: None,
        backdrop_path: None,
        vote_average: 7.0,
        vote_count: 100,
        popularity,
        adult: false,
        original_language: "en".to_string(),
        original_title: title.to_string(),
        genres: genres
            .iter()
            .map(|(id, name)| Genre {
                tmdb_id: *id,
                name: name.to_string(),
            })
            .collect(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Catalog double
// ============================================================================

#[derive(Default)]
pub struct MemoryCatalog {
    movies: Mutex<HashMap<i64, Movie>>,
    genres: Mutex<HashMap<i64, Genre>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_movies(movies: Vec<Movie>) -> Self {
        let catalog = Self::new();
        catalog.insert_all(movies);
        catalog
    }

    pub fn insert_all(&self, movies: Vec<Movie>) {
        let mut map = self.movies.lock().unwrap();
        for movie in movies {
            map.insert(movie.tmdb_id, movie);
        }
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryCatalog {
    async fn upsert(&self, payload: &TmdbMovie) -> AppResult<()> {
        let genre_names = self.genres.lock().unwrap();
        let genres = payload
            .genre_id_set()
            .into_iter()
            .map(|id| {
                genre_names
                    .get(&id)
                    .cloned()
                    .unwrap_or(Genre {
                        tmdb_id: id,
                        name: String::new(),
                    })
            })
            .collect();
        drop(genre_names);

        let movie = Movie {
            tmdb_id: payload.id,
            title: payload.title.clone(),
            overview: payload.overview.clone().unwrap_or_default(),
            release_date: payload.parsed_release_date(),
            poster_path: payload.poster_path.clone(),
            backdrop_path: payload.backdrop_path.clone(),
            vote_average: payload.vote_average,
            vote_count: payload.vote_count,
            popularity: payload.popularity,
            adult: payload.adult,
            original_language: payload.original_language.clone().unwrap_or_default(),
            original_title: payload.original_title.clone().unwrap_or_default(),
            genres,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.movies.lock().unwrap().insert(movie.tmdb_id, movie);
        Ok(())
    }

    async fn get(&self, tmdb_id: i64) -> AppResult<Movie> {
        self.movies
            .lock()
            .unwrap()
            .get(&tmdb_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", tmdb_id)))
    }

    async fn list(
        &self,
        filters: &MovieFilters,
        sort: SortKey,
        page: Page,
    ) -> AppResult<Vec<Movie>> {
        page.validate()?;

        let genre_set: HashSet<i64> = filters.genre_ids.iter().copied().collect();
        let search = filters
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut movies: Vec<Movie> = self
            .movies
            .lock()
            .unwrap()
            .values()
            .filter(|m| {
                if !genre_set.is_empty() && !m.genre_ids().iter().any(|id| genre_set.contains(id)) {
                    return false;
                }
                if let Some(year) = filters.year {
                    if m.release_date.map(|d| d.format("%Y").to_string())
                        != Some(format!("{:04}", year))
                    {
                        return false;
                    }
                }
                if let Some(after) = filters.released_after {
                    match m.release_date {
                        Some(date) if date > after => {}
                        _ => return false,
                    }
                }
                if let Some(min_rating) = filters.min_rating {
                    if m.vote_average < min_rating {
                        return false;
                    }
                }
                if let Some(needle) = &search {
                    if !m.title.to_lowercase().contains(needle)
                        && !m.overview.to_lowercase().contains(needle)
                    {
                        return false;
                    }
                }
                if !filters.include_adult && m.adult {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        match sort {
            SortKey::Popularity => movies.sort_by(|a, b| {
                b.popularity
                    .total_cmp(&a.popularity)
                    .then(a.tmdb_id.cmp(&b.tmdb_id))
            }),
            SortKey::Rating => movies.sort_by(|a, b| {
                b.vote_average
                    .total_cmp(&a.vote_average)
                    .then(b.vote_count.cmp(&a.vote_count))
                    .then(a.tmdb_id.cmp(&b.tmdb_id))
            }),
            SortKey::ReleaseDate => movies.sort_by(|a, b| match (a.release_date, b.release_date) {
                (Some(da), Some(db)) => db.cmp(&da).then(a.tmdb_id.cmp(&b.tmdb_id)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.tmdb_id.cmp(&b.tmdb_id),
            }),
            SortKey::ReleaseDateAsc => {
                movies.sort_by(|a, b| match (a.release_date, b.release_date) {
                    (Some(da), Some(db)) => da.cmp(&db).then(a.tmdb_id.cmp(&b.tmdb_id)),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.tmdb_id.cmp(&b.tmdb_id),
                })
            }
            SortKey::Title => movies.sort_by(|a, b| {
                a.title.cmp(&b.title).then(a.tmdb_id.cmp(&b.tmdb_id))
            }),
        }

        let offset = page.offset() as usize;
        Ok(movies
            .into_iter()
            .skip(offset)
            .take(page.size as usize)
            .collect())
    }

    async fn movies_by_ids(&self, tmdb_ids: &[i64]) -> AppResult<Vec<Movie>> {
        let map = self.movies.lock().unwrap();
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for id in tmdb_ids {
            if seen.insert(*id) {
                if let Some(movie) = map.get(id) {
                    ordered.push(movie.clone());
                }
            }
        }
        Ok(ordered)
    }

    async fn upsert_genre(&self, genre: &TmdbGenre) -> AppResult<()> {
        self.genres.lock().unwrap().insert(
            genre.id,
            Genre {
                tmdb_id: genre.id,
                name: genre.name.clone(),
            },
        );
        Ok(())
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let mut genres: Vec<Genre> = self.genres.lock().unwrap().values().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }
}

// ============================================================================
// Interaction double
// ============================================================================

#[derive(Default)]
struct InteractionState {
    favorites: Vec<Favorite>,
    ratings: Vec<Rating>,
    watchlist: Vec<WatchlistItem>,
    activity: Vec<ActivityEvent>,
    records: Vec<RecommendationRecord>,
    co_pairs: Vec<(i64, i64)>,
}

#[derive(Default)]
pub struct MemoryInteractions {
    state: Mutex<InteractionState>,
}

impl MemoryInteractions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloads the co-occurrence pairs returned for every account
    pub fn set_co_occurrence(&self, pairs: Vec<(i64, i64)>) {
        self.state.lock().unwrap().co_pairs = pairs;
    }

    pub fn recorded(&self) -> Vec<RecommendationRecord> {
        self.state.lock().unwrap().records.clone()
    }
}

#[async_trait::async_trait]
impl InteractionStore for MemoryInteractions {
    async fn add_favorite(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let exists = state
            .favorites
            .iter()
            .any(|f| f.account_id == account_id && f.movie_id == movie_id);
        if !exists {
            state.favorites.push(Favorite {
                account_id,
                movie_id,
                added_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn remove_favorite(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.favorites.len();
        state
            .favorites
            .retain(|f| !(f.account_id == account_id && f.movie_id == movie_id));
        if state.favorites.len() == before {
            return Err(AppError::NotFound("Favorite not found".to_string()));
        }
        Ok(())
    }

    async fn list_favorites(&self, account_id: Uuid) -> AppResult<Vec<Favorite>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .favorites
            .iter()
            .filter(|f| f.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn rate(
        &self,
        account_id: Uuid,
        movie_id: i64,
        score: f64,
        review: Option<String>,
    ) -> AppResult<Rating> {
        validate_rating(score)?;

        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .ratings
            .iter_mut()
            .find(|r| r.account_id == account_id && r.movie_id == movie_id)
        {
            existing.score = score;
            existing.review = review;
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        let rating = Rating {
            account_id,
            movie_id,
            score,
            review,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.ratings.push(rating.clone());
        Ok(rating)
    }

    async fn delete_rating(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.ratings.len();
        state
            .ratings
            .retain(|r| !(r.account_id == account_id && r.movie_id == movie_id));
        if state.ratings.len() == before {
            return Err(AppError::NotFound("Rating not found".to_string()));
        }
        Ok(())
    }

    async fn list_ratings(&self, account_id: Uuid) -> AppResult<Vec<Rating>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .ratings
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn add_to_watchlist(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let exists = state
            .watchlist
            .iter()
            .any(|w| w.account_id == account_id && w.movie_id == movie_id);
        if !exists {
            state.watchlist.push(WatchlistItem {
                account_id,
                movie_id,
                added_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn remove_from_watchlist(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.watchlist.len();
        state
            .watchlist
            .retain(|w| !(w.account_id == account_id && w.movie_id == movie_id));
        if state.watchlist.len() == before {
            return Err(AppError::NotFound("Watchlist entry not found".to_string()));
        }
        Ok(())
    }

    async fn list_watchlist(&self, account_id: Uuid) -> AppResult<Vec<WatchlistItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .watchlist
            .iter()
            .filter(|w| w.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn interacted_ids(&self, account_id: Uuid) -> AppResult<HashSet<i64>> {
        let state = self.state.lock().unwrap();
        let mut ids = HashSet::new();
        ids.extend(
            state
                .favorites
                .iter()
                .filter(|f| f.account_id == account_id)
                .map(|f| f.movie_id),
        );
        ids.extend(
            state
                .ratings
                .iter()
                .filter(|r| r.account_id == account_id)
                .map(|r| r.movie_id),
        );
        ids.extend(
            state
                .watchlist
                .iter()
                .filter(|w| w.account_id == account_id)
                .map(|w| w.movie_id),
        );
        Ok(ids)
    }

    async fn co_occurrence(&self, _account_id: Uuid) -> AppResult<Vec<(i64, i64)>> {
        Ok(self.state.lock().unwrap().co_pairs.clone())
    }

    async fn record_activity(&self, event: NewActivity) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.activity.push(ActivityEvent {
            id: Uuid::new_v4(),
            account_id: event.account_id,
            kind: event.kind.as_str().to_string(),
            movie_id: event.movie_id,
            metadata: event.metadata,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_activity(&self, account_id: Uuid, limit: i64) -> AppResult<Vec<ActivityEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .activity
            .iter()
            .rev()
            .filter(|e| e.account_id == account_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn record_recommendations(
        &self,
        account_id: Uuid,
        mode: &str,
        scored: &[(i64, f64)],
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        for (movie_id, score) in scored {
            let exists = state.records.iter().any(|r| {
                r.account_id == account_id && r.movie_id == *movie_id && r.mode == mode
            });
            if !exists {
                state.records.push(RecommendationRecord {
                    id: Uuid::new_v4(),
                    account_id,
                    movie_id: *movie_id,
                    mode: mode.to_string(),
                    score: *score,
                    clicked: false,
                    created_at: Utc::now(),
                });
            }
        }
        Ok(())
    }

    async fn recommendation_history(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<RecommendationRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .rev()
            .filter(|r| r.account_id == account_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_recommendation_clicked(
        &self,
        account_id: Uuid,
        recommendation_id: Uuid,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state
            .records
            .iter_mut()
            .find(|r| r.id == recommendation_id && r.account_id == account_id)
        {
            Some(record) => {
                record.clicked = true;
                Ok(())
            }
            None => Err(AppError::NotFound(
                "Recommendation record not found".to_string(),
            )),
        }
    }

    async fn prune_recommendations(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let count = state.records.len();
        state.records.retain(|r| r.created_at >= before);
        Ok((count - state.records.len()) as u64)
    }

    async fn prune_activity(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().unwrap();
        let count = state.activity.len();
        state.activity.retain(|e| e.created_at >= before);
        Ok((count - state.activity.len()) as u64)
    }
}

// ============================================================================
// Provider double
// ============================================================================

/// Upstream catalog stub serving a fixed set of detail payloads
#[derive(Default)]
pub struct StubProvider {
    details: HashMap<i64, TmdbMovie>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_details(details: Vec<TmdbMovie>) -> Self {
        Self {
            details: details.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    fn page(&self) -> TmdbPage {
        let results: Vec<TmdbMovie> = self.details.values().cloned().collect();
        TmdbPage {
            page: 1,
            total_pages: 1,
            total_results: results.len() as i64,
            results,
        }
    }
}

#[async_trait::async_trait]
impl CatalogProvider for StubProvider {
    async fn trending(&self, _page: i32) -> AppResult<TmdbPage> {
        Ok(self.page())
    }

    async fn popular(&self, _page: i32) -> AppResult<TmdbPage> {
        Ok(self.page())
    }

    async fn top_rated(&self, _page: i32) -> AppResult<TmdbPage> {
        Ok(self.page())
    }

    async fn upcoming(&self, _page: i32) -> AppResult<TmdbPage> {
        Ok(self.page())
    }

    async fn search(
        &self,
        query: &str,
        _page: i32,
        _include_adult: bool,
        _year: Option<i32>,
    ) -> AppResult<TmdbPage> {
        let needle = query.to_lowercase();
        let results: Vec<TmdbMovie> = self
            .details
            .values()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(TmdbPage {
            page: 1,
            total_pages: 1,
            total_results: results.len() as i64,
            results,
        })
    }

    async fn movie_details(&self, tmdb_id: i64) -> AppResult<TmdbMovie> {
        self.details
            .get(&tmdb_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not found upstream", tmdb_id)))
    }

    async fn genres(&self) -> AppResult<Vec<TmdbGenre>> {
        Ok(vec![
            TmdbGenre {
                id: 28,
                name: "Action".to_string(),
            },
            TmdbGenre {
                id: 12,
                name: "Adventure".to_string(),
            },
        ])
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
