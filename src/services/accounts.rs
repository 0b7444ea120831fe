use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Account, Preferences, Profile, Visibility},
};

/// Partial update for the preferences record; absent fields keep their value
#[derive(Debug, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub email_notifications: Option<bool>,
    pub recommendation_emails: Option<bool>,
    pub include_adult_content: Option<bool>,
    pub preferred_language: Option<String>,
    pub recommendation_diversity: Option<f64>,
    pub profile_visibility: Option<String>,
}

/// Aggregate interaction counts shown on the user dashboard
#[derive(Debug, Serialize)]
pub struct AccountStats {
    pub total_favorites: i64,
    pub total_watchlist: i64,
    pub total_ratings: i64,
    pub total_activities: i64,
    pub average_rating: f64,
    pub favorite_genres: Vec<GenreCount>,
}

#[derive(Debug, Serialize)]
pub struct GenreCount {
    pub name: String,
    pub count: i64,
}

/// Account, credential, and preference persistence
///
/// Token issuance is pass-through: one opaque bearer token per account,
/// created on demand and deleted on logout. No session protocol.
#[derive(Clone)]
pub struct AccountService {
    pool: PgPool,
}

/// Hashes a password with a per-user random salt
fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{}${}", salt, hex::encode(hasher.finalize()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => hash_password(password, salt) == stored,
        None => false,
    }
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an account plus its preferences and profile rows, and issues a
    /// token. Duplicate usernames or emails fail with Conflict.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<(Account, String)> {
        if username.trim().is_empty() || password.len() < 8 {
            return Err(AppError::InvalidInput(
                "Username must be non-empty and password at least 8 characters".to_string(),
            ));
        }

        let salt = Uuid::new_v4().simple().to_string();
        let password_hash = hash_password(password, &salt);
        let account_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, username, email, password_hash, is_staff, created_at)
            VALUES ($1, $2, $3, $4, false, now())
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::Conflict("Username or email already registered".to_string())
            }
            _ => AppError::Database(e),
        })?;

        sqlx::query("INSERT INTO preferences (account_id) VALUES ($1)")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO profiles (account_id, date_joined) VALUES ($1, now())")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let token = self.issue_token(account_id).await?;

        tracing::info!(username = %account.username, "Account registered");

        Ok((account, token))
    }

    /// Verifies credentials and returns the account with its token
    pub async fn login(&self, username: &str, password: &str) -> AppResult<(Account, String)> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

        if !verify_password(password, &account.password_hash) {
            return Err(AppError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        let token = self.issue_token(account.id).await?;
        Ok((account, token))
    }

    /// Deletes the account's token; subsequent requests with it are rejected
    pub async fn logout(&self, account_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Re-hashes the credential after verifying the old one. The bearer
    /// token stays valid.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        if new_password.len() < 8 {
            return Err(AppError::InvalidInput(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let row = sqlx::query("SELECT password_hash FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;
        let stored: String = row.try_get("password_hash")?;

        if !verify_password(old_password, &stored) {
            return Err(AppError::Unauthorized(
                "Old password is incorrect".to_string(),
            ));
        }

        let salt = Uuid::new_v4().simple().to_string();
        sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(hash_password(new_password, &salt))
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(account_id = %account_id, "Password changed");
        Ok(())
    }

    /// Removes the account; tokens, preferences, and interaction rows go
    /// with it via FK cascade
    pub async fn delete_account(&self, account_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(account_id = %account_id, "Account deleted");
        Ok(())
    }

    /// Returns the existing token for the account or creates one
    async fn issue_token(&self, account_id: Uuid) -> AppResult<String> {
        if let Some(row) = sqlx::query("SELECT token FROM auth_tokens WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(row.try_get("token")?);
        }

        let token = Uuid::new_v4().simple().to_string();
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (token, account_id, created_at)
            VALUES ($1, $2, now())
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(&token)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        // Lost races fall back to the winner's token
        let row = sqlx::query("SELECT token FROM auth_tokens WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("token")?)
    }

    /// Resolves a bearer token to its account, if valid
    pub async fn account_by_token(&self, token: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.* FROM accounts a
            JOIN auth_tokens t ON t.account_id = a.id
            WHERE t.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    pub async fn get_preferences(&self, account_id: Uuid) -> AppResult<Preferences> {
        let prefs =
            sqlx::query_as::<_, Preferences>("SELECT * FROM preferences WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Preferences not found".to_string()))?;
        Ok(prefs)
    }

    pub async fn update_preferences(
        &self,
        account_id: Uuid,
        update: PreferencesUpdate,
    ) -> AppResult<Preferences> {
        if let Some(diversity) = update.recommendation_diversity {
            if !(0.0..=1.0).contains(&diversity) {
                return Err(AppError::InvalidInput(
                    "recommendation_diversity must be between 0.0 and 1.0".to_string(),
                ));
            }
        }
        if let Some(visibility) = update.profile_visibility.as_deref() {
            Visibility::parse(visibility)?;
        }

        let current = self.get_preferences(account_id).await?;

        let prefs = sqlx::query_as::<_, Preferences>(
            r#"
            UPDATE preferences SET
                email_notifications = $2,
                recommendation_emails = $3,
                include_adult_content = $4,
                preferred_language = $5,
                recommendation_diversity = $6,
                profile_visibility = $7,
                updated_at = now()
            WHERE account_id = $1
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(
            update
                .email_notifications
                .unwrap_or(current.email_notifications),
        )
        .bind(
            update
                .recommendation_emails
                .unwrap_or(current.recommendation_emails),
        )
        .bind(
            update
                .include_adult_content
                .unwrap_or(current.include_adult_content),
        )
        .bind(
            update
                .preferred_language
                .unwrap_or(current.preferred_language),
        )
        .bind(
            update
                .recommendation_diversity
                .unwrap_or(current.recommendation_diversity),
        )
        .bind(
            update
                .profile_visibility
                .unwrap_or(current.profile_visibility),
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(prefs)
    }

    pub async fn get_profile(&self, account_id: Uuid) -> AppResult<Profile> {
        let mut profile =
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        let rows = sqlx::query(
            r#"
            SELECT genre_id FROM profile_genres
            WHERE account_id = $1
            ORDER BY genre_id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        profile.favorite_genre_ids = rows
            .into_iter()
            .map(|r| r.try_get::<i64, _>("genre_id"))
            .collect::<Result<_, _>>()?;

        Ok(profile)
    }

    /// Replaces the declared favorite genres; unknown genre ids are rejected
    pub async fn set_favorite_genres(
        &self,
        account_id: Uuid,
        genre_ids: &[i64],
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM profile_genres WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        for genre_id in genre_ids {
            sqlx::query("INSERT INTO profile_genres (account_id, genre_id) VALUES ($1, $2)")
                .bind(account_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
                        AppError::NotFound(format!("Genre {} not found", genre_id))
                    }
                    _ => AppError::Database(e),
                })?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Interaction counts and favorite-genre histogram for the dashboard
    pub async fn stats(&self, account_id: Uuid) -> AppResult<AccountStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM favorites WHERE account_id = $1) AS total_favorites,
                (SELECT COUNT(*) FROM watchlist WHERE account_id = $1) AS total_watchlist,
                (SELECT COUNT(*) FROM ratings WHERE account_id = $1) AS total_ratings,
                (SELECT COUNT(*) FROM activity_events WHERE account_id = $1) AS total_activities,
                (SELECT COALESCE(AVG(score), 0.0) FROM ratings WHERE account_id = $1) AS average_rating
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        let genre_rows = sqlx::query(
            r#"
            SELECT g.name, COUNT(*) AS count
            FROM favorites f
            JOIN movie_genres mg ON mg.movie_id = f.movie_id
            JOIN genres g ON g.tmdb_id = mg.genre_id
            WHERE f.account_id = $1
            GROUP BY g.name
            ORDER BY count DESC, g.name
            LIMIT 5
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let favorite_genres = genre_rows
            .into_iter()
            .map(|r| {
                Ok(GenreCount {
                    name: r.try_get("name")?,
                    count: r.try_get("count")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(AccountStats {
            total_favorites: row.try_get("total_favorites")?,
            total_watchlist: row.try_get("total_watchlist")?,
            total_ratings: row.try_get("total_ratings")?,
            total_activities: row.try_get("total_activities")?,
            average_rating: row.try_get("average_rating")?,
            favorite_genres,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let stored = hash_password("hunter2hunter2", "somesalt");
        assert!(verify_password("hunter2hunter2", &stored));
        assert!(!verify_password("wrong-password", &stored));
    }

    #[test]
    fn test_password_hash_salted() {
        let a = hash_password("same-password", "salt-a");
        let b = hash_password("same-password", "salt-b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_malformed_stored_hash() {
        assert!(!verify_password("anything", "no-separator-here"));
    }
}
