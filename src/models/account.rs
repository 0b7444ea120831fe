use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A registered user account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// Profile visibility setting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Friends,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Friends => "friends",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "public" => Ok(Visibility::Public),
            "friends" => Ok(Visibility::Friends),
            "private" => Ok(Visibility::Private),
            other => Err(AppError::InvalidInput(format!(
                "Unknown visibility '{}'",
                other
            ))),
        }
    }
}

/// Per-account preferences, created alongside the account
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Preferences {
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub email_notifications: bool,
    pub recommendation_emails: bool,
    pub include_adult_content: bool,
    pub preferred_language: String,
    /// 0.0..=1.0; higher values thin genre-clustered duplicates more aggressively
    pub recommendation_diversity: f64,
    pub profile_visibility: String,
    pub updated_at: DateTime<Utc>,
}

impl Preferences {
    pub fn visibility(&self) -> Visibility {
        Visibility::parse(&self.profile_visibility).unwrap_or(Visibility::Public)
    }
}

/// Extended profile holding declared favorite genres
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    /// Loaded from the join table, not a profiles column
    #[sqlx(skip)]
    pub favorite_genre_ids: Vec<i64>,
    pub date_joined: DateTime<Utc>,
}

/// Kinds of user activity tracked for analytics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Register,
    Login,
    Logout,
    ViewMovie,
    RateMovie,
    AddFavorite,
    RemoveFavorite,
    AddWatchlist,
    RemoveWatchlist,
    Search,
    ViewRecommendations,
    PasswordChange,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Register => "register",
            ActivityKind::Login => "login",
            ActivityKind::Logout => "logout",
            ActivityKind::ViewMovie => "view_movie",
            ActivityKind::RateMovie => "rate_movie",
            ActivityKind::AddFavorite => "add_favorite",
            ActivityKind::RemoveFavorite => "remove_favorite",
            ActivityKind::AddWatchlist => "add_watchlist",
            ActivityKind::RemoveWatchlist => "remove_watchlist",
            ActivityKind::Search => "search",
            ActivityKind::ViewRecommendations => "view_recommendations",
            ActivityKind::PasswordChange => "password_change",
        }
    }
}

/// Append-only activity log entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityEvent {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub account_id: Uuid,
    pub kind: String,
    pub movie_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
