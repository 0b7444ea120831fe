use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::auth::{client_meta, CurrentUser},
    models::{Account, ActivityEvent, ActivityKind, Preferences, Profile, RecommendationRecord},
    services::accounts::{AccountStats, PreferencesUpdate},
    services::interactions::NewActivity,
};

use super::AppState;

const ACTIVITY_PAGE: i64 = 50;
const HISTORY_PAGE: i64 = 50;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Account,
    pub preferences: Preferences,
    pub profile: Profile,
}

/// Handler for the signed-in account summary
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<MeResponse>> {
    let preferences = state.accounts.get_preferences(account.id).await?;
    let profile = state.accounts.get_profile(account.id).await?;
    Ok(Json(MeResponse {
        user: account,
        preferences,
        profile,
    }))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<Preferences>> {
    let preferences = state.accounts.get_preferences(account.id).await?;
    Ok(Json(preferences))
}

/// Handler for partial preference updates; absent fields are untouched
pub async fn update_preferences(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Json(update): Json<PreferencesUpdate>,
) -> AppResult<Json<Preferences>> {
    let preferences = state.accounts.update_preferences(account.id, update).await?;
    Ok(Json(preferences))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub favorite_genre_ids: Vec<i64>,
}

/// Handler that replaces the declared favorite genres
pub async fn set_favorite_genres(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<Profile>> {
    state
        .accounts
        .set_favorite_genres(account.id, &update.favorite_genre_ids)
        .await?;
    let profile = state.accounts.get_profile(account.id).await?;
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Handler for the account's recent activity log
pub async fn activity(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<ActivityEvent>>> {
    let limit = query.limit.unwrap_or(ACTIVITY_PAGE).clamp(1, ACTIVITY_PAGE);
    let events = state.interactions.list_activity(account.id, limit).await?;
    Ok(Json(events))
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: Account,
    pub stats: AccountStats,
    pub recent_activity: Vec<ActivityEvent>,
}

/// Handler for the dashboard: counts, rating average, genre histogram, and
/// the latest activity in one response
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<Json<DashboardResponse>> {
    let stats = state.accounts.stats(account.id).await?;
    let recent_activity = state.interactions.list_activity(account.id, 10).await?;
    Ok(Json(DashboardResponse {
        user: account,
        stats,
        recent_activity,
    }))
}

/// Handler for the account's recommendation history
pub async fn recommendation_history(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<RecommendationRecord>>> {
    let limit = query.limit.unwrap_or(HISTORY_PAGE).clamp(1, HISTORY_PAGE);
    let records = state
        .interactions
        .recommendation_history(account.id, limit)
        .await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Handler for credential rotation; the caller's token stays valid
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    headers: HeaderMap,
    Json(body): Json<PasswordChangeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .accounts
        .change_password(account.id, &body.old_password, &body.new_password)
        .await?;

    let (ip, user_agent) = client_meta(&headers);
    let event =
        NewActivity::new(account.id, ActivityKind::PasswordChange).with_client(ip, user_agent);
    if let Err(e) = state.interactions.record_activity(event).await {
        tracing::warn!(error = %e, "Failed to record password change activity");
    }

    Ok(Json(json!({ "message": "Password changed" })))
}

/// Handler for account deletion; interaction rows cascade with the account
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> AppResult<StatusCode> {
    state.accounts.delete_account(account.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ClickedRequest {
    pub recommendation_id: Uuid,
}

/// Handler that marks one emitted recommendation as clicked through
pub async fn mark_clicked(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    Json(body): Json<ClickedRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .interactions
        .mark_recommendation_clicked(account.id, body.recommendation_id)
        .await?;
    Ok(Json(json!({ "clicked": true })))
}
