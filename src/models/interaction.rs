use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Lowest score a user can assign, matching the half-star UI convention
pub const MIN_RATING: f64 = 0.5;
/// Highest score a user can assign
pub const MAX_RATING: f64 = 5.0;

/// Kinds of user-authored interaction with a movie
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Favorite,
    Rating,
    Watchlist,
}

/// A movie marked as a favorite by an account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Favorite {
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub movie_id: i64,
    pub added_at: DateTime<Utc>,
}

/// A user rating with optional review text
///
/// One row per (account, movie); re-rating overwrites score and review.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rating {
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub movie_id: i64,
    pub score: f64,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A movie queued on an account's watchlist
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WatchlistItem {
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub movie_id: i64,
    pub added_at: DateTime<Utc>,
}

/// Validates a rating score against the allowed range
pub fn validate_rating(score: f64) -> AppResult<()> {
    if !score.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&score) {
        return Err(AppError::InvalidInput(format!(
            "Rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, score
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating_in_range() {
        assert!(validate_rating(0.5).is_ok());
        assert!(validate_rating(3.5).is_ok());
        assert!(validate_rating(5.0).is_ok());
    }

    #[test]
    fn test_validate_rating_out_of_range() {
        assert!(validate_rating(0.0).is_err());
        assert!(validate_rating(5.5).is_err());
        assert!(validate_rating(-1.0).is_err());
        assert!(validate_rating(f64::NAN).is_err());
    }

    #[test]
    fn test_interaction_kind_serialization() {
        let json = serde_json::to_string(&InteractionKind::Watchlist).unwrap();
        assert_eq!(json, "\"watchlist\"");
    }
}
