use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        interaction::validate_rating, ActivityEvent, ActivityKind, Favorite, Rating,
        RecommendationRecord, WatchlistItem,
    },
};

/// Ratings at or above this score count as "liked" for the co-occurrence
/// heuristic
pub const LIKED_RATING_THRESHOLD: f64 = 3.5;

/// A new activity log entry, before persistence assigns id and timestamp
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub account_id: Uuid,
    pub kind: ActivityKind,
    pub movie_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewActivity {
    pub fn new(account_id: Uuid, kind: ActivityKind) -> Self {
        Self {
            account_id,
            kind,
            movie_id: None,
            metadata: serde_json::json!({}),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_movie(mut self, movie_id: i64) -> Self {
        self.movie_id = Some(movie_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// User-authored records referencing catalog entries
///
/// Uniqueness invariant: at most one row per (account, movie) per interaction
/// kind. Favorite and watchlist adds are idempotent no-ops on duplicates;
/// rating is an upsert. Every mutation is one transaction.
#[async_trait::async_trait]
pub trait InteractionStore: Send + Sync {
    async fn add_favorite(&self, account_id: Uuid, movie_id: i64) -> AppResult<()>;
    async fn remove_favorite(&self, account_id: Uuid, movie_id: i64) -> AppResult<()>;
    async fn list_favorites(&self, account_id: Uuid) -> AppResult<Vec<Favorite>>;

    /// Upserts a rating; re-rating overwrites score/review and bumps updated_at
    async fn rate(
        &self,
        account_id: Uuid,
        movie_id: i64,
        score: f64,
        review: Option<String>,
    ) -> AppResult<Rating>;
    async fn delete_rating(&self, account_id: Uuid, movie_id: i64) -> AppResult<()>;
    async fn list_ratings(&self, account_id: Uuid) -> AppResult<Vec<Rating>>;

    async fn add_to_watchlist(&self, account_id: Uuid, movie_id: i64) -> AppResult<()>;
    async fn remove_from_watchlist(&self, account_id: Uuid, movie_id: i64) -> AppResult<()>;
    async fn list_watchlist(&self, account_id: Uuid) -> AppResult<Vec<WatchlistItem>>;

    /// Every movie the account has favorited, rated, or watchlisted
    async fn interacted_ids(&self, account_id: Uuid) -> AppResult<HashSet<i64>>;

    /// Co-occurrence candidates for collaborative filtering
    ///
    /// Returns (movie_id, co_count) pairs: movies favorited or highly rated by
    /// accounts that share at least one favorite/rating with this account,
    /// counted by how many of those neighbors liked them. A heuristic, not a
    /// trained model.
    async fn co_occurrence(&self, account_id: Uuid) -> AppResult<Vec<(i64, i64)>>;

    /// Appends one activity event; the log is never updated in place
    async fn record_activity(&self, event: NewActivity) -> AppResult<()>;
    async fn list_activity(&self, account_id: Uuid, limit: i64) -> AppResult<Vec<ActivityEvent>>;

    /// Persists emitted recommendations for click-through measurement
    async fn record_recommendations(
        &self,
        account_id: Uuid,
        mode: &str,
        scored: &[(i64, f64)],
    ) -> AppResult<()>;
    async fn recommendation_history(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<RecommendationRecord>>;
    async fn mark_recommendation_clicked(
        &self,
        account_id: Uuid,
        recommendation_id: Uuid,
    ) -> AppResult<()>;

    /// Deletes recommendation records older than the cutoff; returns the count
    async fn prune_recommendations(&self, before: DateTime<Utc>) -> AppResult<u64>;

    /// Deletes activity events older than the cutoff; returns the count
    async fn prune_activity(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Postgres-backed interaction store
#[derive(Clone)]
pub struct PgInteractionStore {
    pool: PgPool,
}

impl PgInteractionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a foreign-key violation on movie_id to NotFound
///
/// Interactions must reference mirrored movies; the FK is the enforcement
/// point and the caller sees it as a missing catalog entry.
fn map_movie_fk(e: sqlx::Error, movie_id: i64) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            AppError::NotFound(format!("Movie {} not found in catalog", movie_id))
        }
        _ => AppError::Database(e),
    }
}

#[async_trait::async_trait]
impl InteractionStore for PgInteractionStore {
    async fn add_favorite(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO favorites (account_id, movie_id, added_at)
            VALUES ($1, $2, now())
            ON CONFLICT (account_id, movie_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(movie_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_movie_fk(e, movie_id))?;
        Ok(())
    }

    async fn remove_favorite(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM favorites WHERE account_id = $1 AND movie_id = $2")
            .bind(account_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Movie {} is not in favorites",
                movie_id
            )));
        }
        Ok(())
    }

    async fn list_favorites(&self, account_id: Uuid) -> AppResult<Vec<Favorite>> {
        let favorites = sqlx::query_as::<_, Favorite>(
            "SELECT * FROM favorites WHERE account_id = $1 ORDER BY added_at DESC, movie_id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(favorites)
    }

    async fn rate(
        &self,
        account_id: Uuid,
        movie_id: i64,
        score: f64,
        review: Option<String>,
    ) -> AppResult<Rating> {
        validate_rating(score)?;

        let rating = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (account_id, movie_id, score, review, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            ON CONFLICT (account_id, movie_id) DO UPDATE SET
                score = EXCLUDED.score,
                review = EXCLUDED.review,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(movie_id)
        .bind(score)
        .bind(review)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_movie_fk(e, movie_id))?;

        Ok(rating)
    }

    async fn delete_rating(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM ratings WHERE account_id = $1 AND movie_id = $2")
            .bind(account_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No rating found for movie {}",
                movie_id
            )));
        }
        Ok(())
    }

    async fn list_ratings(&self, account_id: Uuid) -> AppResult<Vec<Rating>> {
        let ratings = sqlx::query_as::<_, Rating>(
            "SELECT * FROM ratings WHERE account_id = $1 ORDER BY created_at DESC, movie_id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ratings)
    }

    async fn add_to_watchlist(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO watchlist (account_id, movie_id, added_at)
            VALUES ($1, $2, now())
            ON CONFLICT (account_id, movie_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(movie_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_movie_fk(e, movie_id))?;
        Ok(())
    }

    async fn remove_from_watchlist(&self, account_id: Uuid, movie_id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM watchlist WHERE account_id = $1 AND movie_id = $2")
            .bind(account_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Movie {} is not on the watchlist",
                movie_id
            )));
        }
        Ok(())
    }

    async fn list_watchlist(&self, account_id: Uuid) -> AppResult<Vec<WatchlistItem>> {
        let items = sqlx::query_as::<_, WatchlistItem>(
            "SELECT * FROM watchlist WHERE account_id = $1 ORDER BY added_at DESC, movie_id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn interacted_ids(&self, account_id: Uuid) -> AppResult<HashSet<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT movie_id FROM favorites WHERE account_id = $1
            UNION
            SELECT movie_id FROM ratings WHERE account_id = $1
            UNION
            SELECT movie_id FROM watchlist WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            ids.insert(row.try_get::<i64, _>("movie_id")?);
        }
        Ok(ids)
    }

    async fn co_occurrence(&self, account_id: Uuid) -> AppResult<Vec<(i64, i64)>> {
        let rows = sqlx::query(
            r#"
            WITH mine AS (
                SELECT movie_id FROM favorites WHERE account_id = $1
                UNION
                SELECT movie_id FROM ratings WHERE account_id = $1
            ),
            neighbors AS (
                SELECT DISTINCT i.account_id
                FROM (
                    SELECT account_id, movie_id FROM favorites
                    UNION
                    SELECT account_id, movie_id FROM ratings
                ) i
                WHERE i.movie_id IN (SELECT movie_id FROM mine)
                  AND i.account_id <> $1
            )
            SELECT liked.movie_id, COUNT(DISTINCT liked.account_id) AS co_count
            FROM (
                SELECT account_id, movie_id FROM favorites
                WHERE account_id IN (SELECT account_id FROM neighbors)
                UNION
                SELECT account_id, movie_id FROM ratings
                WHERE account_id IN (SELECT account_id FROM neighbors)
                  AND score >= $2
            ) liked
            GROUP BY liked.movie_id
            ORDER BY co_count DESC, liked.movie_id ASC
            LIMIT 200
            "#,
        )
        .bind(account_id)
        .bind(LIKED_RATING_THRESHOLD)
        .fetch_all(&self.pool)
        .await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push((
                row.try_get::<i64, _>("movie_id")?,
                row.try_get::<i64, _>("co_count")?,
            ));
        }
        Ok(pairs)
    }

    async fn record_activity(&self, event: NewActivity) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_events
                (id, account_id, kind, movie_id, metadata, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.account_id)
        .bind(event.kind.as_str())
        .bind(event.movie_id)
        .bind(event.metadata)
        .bind(event.ip_address)
        .bind(event.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_activity(&self, account_id: Uuid, limit: i64) -> AppResult<Vec<ActivityEvent>> {
        let events = sqlx::query_as::<_, ActivityEvent>(
            "SELECT * FROM activity_events WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn record_recommendations(
        &self,
        account_id: Uuid,
        mode: &str,
        scored: &[(i64, f64)],
    ) -> AppResult<()> {
        // One audit row per (account, movie, mode); re-emitting the same
        // suggestion keeps the original row and its clicked flag.
        for (movie_id, score) in scored {
            sqlx::query(
                r#"
                INSERT INTO recommendation_records
                    (id, account_id, movie_id, mode, score, clicked, created_at)
                VALUES ($1, $2, $3, $4, $5, false, now())
                ON CONFLICT (account_id, movie_id, mode) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(account_id)
            .bind(movie_id)
            .bind(mode)
            .bind(score)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn recommendation_history(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<RecommendationRecord>> {
        let records = sqlx::query_as::<_, RecommendationRecord>(
            r#"
            SELECT * FROM recommendation_records
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn mark_recommendation_clicked(
        &self,
        account_id: Uuid,
        recommendation_id: Uuid,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE recommendation_records SET clicked = true WHERE id = $1 AND account_id = $2",
        )
        .bind(recommendation_id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Recommendation {} not found",
                recommendation_id
            )));
        }
        Ok(())
    }

    async fn prune_recommendations(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM recommendation_records WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn prune_activity(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM activity_events WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
