use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Movie;

/// Default and maximum page sizes for recommendation output
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Candidate-generation and scoring policy for one recommendation request
///
/// A closed set: unknown mode strings are rejected up front rather than
/// silently defaulting to one of the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationMode {
    Trending,
    Popular,
    TopRated,
    Upcoming,
    GenreBased,
    Collaborative,
    ContentBased,
    Similar { seed: i64 },
}

impl RecommendationMode {
    /// Parses a mode string plus the optional seed movie id
    ///
    /// `similar` is the only mode that takes a seed; supplying it for other
    /// modes is ignored, omitting it for `similar` is an input error.
    pub fn parse(kind: &str, seed: Option<i64>) -> AppResult<Self> {
        match kind {
            "trending" => Ok(RecommendationMode::Trending),
            "popular" => Ok(RecommendationMode::Popular),
            "top_rated" => Ok(RecommendationMode::TopRated),
            "upcoming" => Ok(RecommendationMode::Upcoming),
            "genre_based" => Ok(RecommendationMode::GenreBased),
            "collaborative" => Ok(RecommendationMode::Collaborative),
            "content_based" => Ok(RecommendationMode::ContentBased),
            "similar" => match seed {
                Some(seed) => Ok(RecommendationMode::Similar { seed }),
                None => Err(AppError::InvalidInput(
                    "Mode 'similar' requires a seed movie id".to_string(),
                )),
            },
            other => Err(AppError::InvalidInput(format!(
                "Unknown recommendation mode '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationMode::Trending => "trending",
            RecommendationMode::Popular => "popular",
            RecommendationMode::TopRated => "top_rated",
            RecommendationMode::Upcoming => "upcoming",
            RecommendationMode::GenreBased => "genre_based",
            RecommendationMode::Collaborative => "collaborative",
            RecommendationMode::ContentBased => "content_based",
            RecommendationMode::Similar { .. } => "similar",
        }
    }

    /// Whether the mode needs an authenticated account to build candidates
    pub fn requires_account(&self) -> bool {
        matches!(
            self,
            RecommendationMode::GenreBased
                | RecommendationMode::Collaborative
                | RecommendationMode::ContentBased
        )
    }
}

/// Pagination and override knobs for a recommendation request
#[derive(Debug, Clone, Copy)]
pub struct RecommendationParams {
    pub page_size: usize,
    /// When set, entries the account already interacted with are not suppressed
    pub include_interacted: bool,
}

impl Default for RecommendationParams {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            include_interacted: false,
        }
    }
}

impl RecommendationParams {
    /// Validates pagination bounds before any store is touched
    pub fn validate(&self) -> AppResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::InvalidInput(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

/// One emitted recommendation: a movie with its confidence score in [0, 1]
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMovie {
    #[serde(flatten)]
    pub movie: Movie,
    pub score: f64,
}

/// Audit record written for every recommendation actually returned to a user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecommendationRecord {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub movie_id: i64,
    pub mode: String,
    pub score: f64,
    pub clicked: bool,
    pub created_at: DateTime<Utc>,
}
