use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::error::AppError;
use crate::models::Account;
use crate::routes::AppState;

/// Extractor for endpoints that require an authenticated account.
///
/// Expects an `Authorization: Bearer <token>` header carrying an opaque
/// token issued by the auth endpoints. Rejects with 401 when the header is
/// missing or the token is unknown.
pub struct CurrentUser(pub Account);

/// Extractor for endpoints that serve both anonymous and signed-in callers.
///
/// Resolves to `None` when no `Authorization` header is present. A header
/// that is present but invalid is still a 401, so callers never silently
/// fall back to anonymous behavior with bad credentials.
pub struct MaybeUser(pub Option<Account>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed Authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".to_string()))?;
    Ok(Some(token))
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(MaybeUser(None)),
            Some(token) => match state.accounts.account_by_token(token).await? {
                Some(account) => Ok(MaybeUser(Some(account))),
                None => Err(AppError::Unauthorized("Invalid or expired token".to_string())),
            },
        }
    }
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(account) = MaybeUser::from_request_parts(parts, state).await?;
        account
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor for staff-only endpoints. Builds on [`CurrentUser`] and
/// additionally rejects non-staff accounts with 403.
pub struct StaffUser(pub Account);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(account) = CurrentUser::from_request_parts(parts, state).await?;
        if !account.is_staff {
            return Err(AppError::Forbidden("Staff access required".to_string()));
        }
        Ok(StaffUser(account))
    }
}

/// Best-effort client metadata for activity logging.
pub fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string());
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    (ip, user_agent)
}
