use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::auth::{client_meta, CurrentUser},
    models::{Account, ActivityKind},
    services::interactions::NewActivity,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: Account,
    pub token: String,
}

/// Handler for account registration
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let (account, token) = state
        .accounts
        .register(&body.username, &body.email, &body.password)
        .await?;

    log_auth_event(&state, &headers, account.id, ActivityKind::Register).await;

    Ok((StatusCode::CREATED, Json(AuthResponse { user: account, token })))
}

/// Handler for credential login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (account, token) = state.accounts.login(&body.username, &body.password).await?;

    log_auth_event(&state, &headers, account.id, ActivityKind::Login).await;

    Ok(Json(AuthResponse { user: account, token }))
}

/// Handler for logout; revokes the caller's token
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    headers: HeaderMap,
) -> AppResult<Json<serde_json::Value>> {
    state.accounts.logout(account.id).await?;

    log_auth_event(&state, &headers, account.id, ActivityKind::Logout).await;

    Ok(Json(json!({ "message": "Logged out" })))
}

async fn log_auth_event(
    state: &AppState,
    headers: &HeaderMap,
    account_id: Uuid,
    kind: ActivityKind,
) {
    let (ip, user_agent) = client_meta(headers);
    let event = NewActivity::new(account_id, kind).with_client(ip, user_agent);
    // Activity logging is best-effort; auth outcomes never depend on it
    if let Err(e) = state.interactions.record_activity(event).await {
        tracing::warn!(error = %e, "Failed to record auth activity");
    }
}
