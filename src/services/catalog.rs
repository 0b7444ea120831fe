use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::{
    error::{AppError, AppResult},
    models::{Genre, Movie, TmdbGenre, TmdbMovie},
};

/// Optional filters for catalog listing
#[derive(Debug, Clone, Default)]
pub struct MovieFilters {
    /// Keep movies intersecting at least one of these genres
    pub genre_ids: Vec<i64>,
    /// Keep movies released in this year
    pub year: Option<i32>,
    /// Keep movies with at least this upstream vote average
    pub min_rating: Option<f64>,
    /// Case-insensitive substring match against title and overview
    pub search: Option<String>,
    /// Keep movies released strictly after this date
    pub released_after: Option<chrono::NaiveDate>,
    /// Adult-flagged movies are excluded unless set
    pub include_adult: bool,
}

/// Sort key for catalog listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Popularity,
    Rating,
    ReleaseDate,
    /// Soonest release first. Internal ordering for upcoming pools; not
    /// accepted by `parse`
    ReleaseDateAsc,
    Title,
}

impl SortKey {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "popularity" => Ok(SortKey::Popularity),
            "rating" => Ok(SortKey::Rating),
            "release_date" => Ok(SortKey::ReleaseDate),
            "title" => Ok(SortKey::Title),
            other => Err(AppError::InvalidInput(format!(
                "Unknown sort key '{}'",
                other
            ))),
        }
    }
}

/// 1-based offset pagination
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: 20,
        }
    }
}

impl Page {
    pub fn validate(&self) -> AppResult<()> {
        if self.number == 0 {
            return Err(AppError::InvalidInput("page must be >= 1".to_string()));
        }
        if self.size == 0 || self.size > 100 {
            return Err(AppError::InvalidInput(
                "page_size must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.number as i64 - 1) * self.size as i64
    }
}

/// The local mirror of the upstream movie catalog
///
/// Rows are keyed by TMDb id; `upsert` replaces all metadata wholesale so a
/// re-sync always converges on the upstream state. Reads never fail on empty
/// result sets.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts or replaces a movie by TMDb id, including its genre links
    async fn upsert(&self, movie: &TmdbMovie) -> AppResult<()>;

    /// Fetches one movie with genres attached; NotFound when absent
    async fn get(&self, tmdb_id: i64) -> AppResult<Movie>;

    /// Returns a page of movies matching the filters, in the given order
    async fn list(&self, filters: &MovieFilters, sort: SortKey, page: Page)
        -> AppResult<Vec<Movie>>;

    /// Fetches movies by id, preserving input order for ids that exist
    async fn movies_by_ids(&self, tmdb_ids: &[i64]) -> AppResult<Vec<Movie>>;

    /// Inserts or renames a genre by TMDb id
    async fn upsert_genre(&self, genre: &TmdbGenre) -> AppResult<()>;

    /// All genres, ordered by name
    async fn list_genres(&self) -> AppResult<Vec<Genre>>;
}

/// Postgres-backed catalog mirror
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads genres for a set of movies and attaches them in place
    async fn attach_genres(&self, movies: &mut [Movie]) -> AppResult<()> {
        if movies.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = movies.iter().map(|m| m.tmdb_id).collect();
        let rows = sqlx::query(
            r#"
            SELECT mg.movie_id, g.tmdb_id, g.name
            FROM movie_genres mg
            JOIN genres g ON g.tmdb_id = mg.genre_id
            WHERE mg.movie_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_movie: HashMap<i64, Vec<Genre>> = HashMap::new();
        for row in rows {
            let movie_id: i64 = row.try_get("movie_id")?;
            by_movie.entry(movie_id).or_default().push(Genre {
                tmdb_id: row.try_get("tmdb_id")?,
                name: row.try_get("name")?,
            });
        }

        for movie in movies.iter_mut() {
            movie.genres = by_movie.remove(&movie.tmdb_id).unwrap_or_default();
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn upsert(&self, movie: &TmdbMovie) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO movies (
                tmdb_id, title, overview, release_date, poster_path, backdrop_path,
                vote_average, vote_count, popularity, adult, original_language,
                original_title, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now(), now())
            ON CONFLICT (tmdb_id) DO UPDATE SET
                title = EXCLUDED.title,
                overview = EXCLUDED.overview,
                release_date = EXCLUDED.release_date,
                poster_path = EXCLUDED.poster_path,
                backdrop_path = EXCLUDED.backdrop_path,
                vote_average = EXCLUDED.vote_average,
                vote_count = EXCLUDED.vote_count,
                popularity = EXCLUDED.popularity,
                adult = EXCLUDED.adult,
                original_language = EXCLUDED.original_language,
                original_title = EXCLUDED.original_title,
                updated_at = now()
            "#,
        )
        .bind(movie.id)
        .bind(&movie.title)
        .bind(movie.overview.as_deref().unwrap_or(""))
        .bind(movie.parsed_release_date())
        .bind(&movie.poster_path)
        .bind(&movie.backdrop_path)
        .bind(movie.vote_average)
        .bind(movie.vote_count)
        .bind(movie.popularity)
        .bind(movie.adult)
        .bind(movie.original_language.as_deref().unwrap_or(""))
        .bind(movie.original_title.as_deref().unwrap_or(&movie.title))
        .execute(&mut *tx)
        .await?;

        // Genre links are replaced wholesale alongside the metadata. Detail
        // payloads carry nested genre objects that may not be mirrored yet.
        let genre_ids = movie.genre_id_set();
        if let Some(genres) = &movie.genres {
            for genre in genres {
                sqlx::query(
                    r#"
                    INSERT INTO genres (tmdb_id, name)
                    VALUES ($1, $2)
                    ON CONFLICT (tmdb_id) DO UPDATE SET name = EXCLUDED.name
                    "#,
                )
                .bind(genre.id)
                .bind(&genre.name)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query("DELETE FROM movie_genres WHERE movie_id = $1")
            .bind(movie.id)
            .execute(&mut *tx)
            .await?;

        for genre_id in genre_ids {
            sqlx::query(
                r#"
                INSERT INTO movie_genres (movie_id, genre_id)
                SELECT $1, $2 WHERE EXISTS (SELECT 1 FROM genres WHERE tmdb_id = $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(movie.id)
            .bind(genre_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, tmdb_id: i64) -> AppResult<Movie> {
        let movie = sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE tmdb_id = $1")
            .bind(tmdb_id)
            .fetch_optional(&self.pool)
            .await?;

        match movie {
            Some(mut movie) => {
                self.attach_genres(std::slice::from_mut(&mut movie)).await?;
                Ok(movie)
            }
            None => Err(AppError::NotFound(format!("Movie {} not found", tmdb_id))),
        }
    }

    async fn list(
        &self,
        filters: &MovieFilters,
        sort: SortKey,
        page: Page,
    ) -> AppResult<Vec<Movie>> {
        page.validate()?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT m.* FROM movies m WHERE 1=1");

        if !filters.genre_ids.is_empty() {
            builder.push(" AND m.tmdb_id IN (SELECT movie_id FROM movie_genres WHERE genre_id = ANY(");
            builder.push_bind(filters.genre_ids.clone());
            builder.push("))");
        }

        if let Some(year) = filters.year {
            builder.push(" AND date_part('year', m.release_date) = ");
            builder.push_bind(year as f64);
        }

        if let Some(released_after) = filters.released_after {
            builder.push(" AND m.release_date > ");
            builder.push_bind(released_after);
        }

        if let Some(min_rating) = filters.min_rating {
            builder.push(" AND m.vote_average >= ");
            builder.push_bind(min_rating);
        }

        if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search);
            builder.push(" AND (m.title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR m.overview ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        if !filters.include_adult {
            builder.push(" AND m.adult = false");
        }

        match sort {
            SortKey::Popularity => {
                builder.push(" ORDER BY m.popularity DESC, m.tmdb_id ASC");
            }
            SortKey::Rating => {
                builder.push(" ORDER BY m.vote_average DESC, m.vote_count DESC, m.tmdb_id ASC");
            }
            SortKey::ReleaseDate => {
                builder.push(" ORDER BY m.release_date DESC NULLS LAST, m.tmdb_id ASC");
            }
            SortKey::ReleaseDateAsc => {
                builder.push(" ORDER BY m.release_date ASC NULLS LAST, m.tmdb_id ASC");
            }
            SortKey::Title => {
                builder.push(" ORDER BY m.title ASC, m.tmdb_id ASC");
            }
        }

        builder.push(" LIMIT ");
        builder.push_bind(page.size as i64);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let mut movies: Vec<Movie> = builder.build_query_as().fetch_all(&self.pool).await?;
        self.attach_genres(&mut movies).await?;

        Ok(movies)
    }

    async fn movies_by_ids(&self, tmdb_ids: &[i64]) -> AppResult<Vec<Movie>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut movies =
            sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE tmdb_id = ANY($1)")
                .bind(tmdb_ids)
                .fetch_all(&self.pool)
                .await?;
        self.attach_genres(&mut movies).await?;

        // Preserve caller ordering; ids without a mirrored row are skipped
        let by_id: HashMap<i64, Movie> =
            movies.into_iter().map(|m| (m.tmdb_id, m)).collect();
        let mut ordered = Vec::with_capacity(tmdb_ids.len());
        let mut seen = std::collections::HashSet::new();
        for id in tmdb_ids {
            if seen.insert(*id) {
                if let Some(movie) = by_id.get(id) {
                    ordered.push(movie.clone());
                }
            }
        }

        Ok(ordered)
    }

    async fn upsert_genre(&self, genre: &TmdbGenre) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO genres (tmdb_id, name)
            VALUES ($1, $2)
            ON CONFLICT (tmdb_id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(genre.id)
        .bind(&genre.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT tmdb_id, name FROM genres ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(genres)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("popularity").unwrap(), SortKey::Popularity);
        assert_eq!(SortKey::parse("rating").unwrap(), SortKey::Rating);
        assert_eq!(
            SortKey::parse("release_date").unwrap(),
            SortKey::ReleaseDate
        );
        assert_eq!(SortKey::parse("title").unwrap(), SortKey::Title);
        assert!(SortKey::parse("box_office").is_err());
    }

    #[test]
    fn test_page_validation() {
        assert!(Page::default().validate().is_ok());
        assert!(Page { number: 0, size: 20 }.validate().is_err());
        assert!(Page { number: 1, size: 0 }.validate().is_err());
        assert!(Page { number: 1, size: 101 }.validate().is_err());
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(Page { number: 1, size: 20 }.offset(), 0);
        assert_eq!(Page { number: 3, size: 20 }.offset(), 40);
    }
}
