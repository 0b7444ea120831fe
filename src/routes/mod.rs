use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id::{assign_request_id, trace_span_for};
use crate::services::accounts::AccountService;
use crate::services::catalog::CatalogStore;
use crate::services::interactions::InteractionStore;
use crate::services::recommendations::RecommendationAssembler;
use crate::services::sync::CatalogSync;

pub mod auth;
pub mod interactions;
pub mod movies;
pub mod recommendations;
pub mod users;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub catalog: Arc<dyn CatalogStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub assembler: Arc<RecommendationAssembler>,
    pub sync: CatalogSync,
}

impl AppState {
    pub fn new(
        accounts: AccountService,
        catalog: Arc<dyn CatalogStore>,
        interactions: Arc<dyn InteractionStore>,
        assembler: Arc<RecommendationAssembler>,
        sync: CatalogSync,
    ) -> Self {
        Self {
            accounts,
            catalog,
            interactions,
            assembler,
            sync,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes(state))
        .layer(TraceLayer::new_for_http().make_span_with(trace_span_for))
        .layer(axum::middleware::from_fn(assign_request_id))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        // Catalog
        .route("/movies", get(movies::list_movies))
        .route("/movies/search", post(movies::search_movies))
        .route("/movies/:tmdb_id", get(movies::get_movie))
        .route("/movies/:tmdb_id/similar", get(recommendations::similar))
        .route("/genres", get(movies::list_genres))
        // Recommendations
        .route("/recommendations", get(recommendations::recommend))
        // Per-account interactions
        .route(
            "/users/me/favorites",
            get(interactions::list_favorites).post(interactions::add_favorite),
        )
        .route(
            "/users/me/favorites/:tmdb_id",
            delete(interactions::remove_favorite),
        )
        .route(
            "/users/me/ratings",
            get(interactions::list_ratings).post(interactions::rate_movie),
        )
        .route(
            "/users/me/ratings/:tmdb_id",
            delete(interactions::delete_rating),
        )
        .route(
            "/users/me/watchlist",
            get(interactions::list_watchlist).post(interactions::add_to_watchlist),
        )
        .route(
            "/users/me/watchlist/:tmdb_id",
            delete(interactions::remove_from_watchlist),
        )
        // Account surface
        .route("/users/me", get(users::me).delete(users::delete_account))
        .route("/users/me/password", post(users::change_password))
        .route(
            "/users/me/preferences",
            get(users::get_preferences).put(users::update_preferences),
        )
        .route("/users/me/profile", put(users::set_favorite_genres))
        .route("/users/me/activity", get(users::activity))
        .route("/users/me/dashboard", get(users::dashboard))
        .route("/users/me/history", get(users::recommendation_history))
        .route("/users/me/history/clicked", post(users::mark_clicked))
        // Staff
        .route("/admin/sync/genres", post(movies::sync_genres))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
