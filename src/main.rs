use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cinematch_api::{
    config::Config,
    db::{
        postgres::{create_pool, run_migrations},
        redis::{create_redis_client, Cache},
    },
    routes::{create_router, AppState},
    services::{
        accounts::AccountService,
        catalog::PgCatalogStore,
        interactions::PgInteractionStore,
        providers::{tmdb::TmdbProvider, CatalogProvider},
        recommendations::RecommendationAssembler,
        sync::{spawn_refresh_task, CatalogSync},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;

    let provider: Arc<dyn CatalogProvider> = Arc::new(TmdbProvider::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
    ));

    let catalog = Arc::new(PgCatalogStore::new(pool.clone()));
    let interactions = Arc::new(PgInteractionStore::new(pool.clone()));
    let accounts = AccountService::new(pool.clone());
    let assembler = Arc::new(RecommendationAssembler::new(
        catalog.clone(),
        interactions.clone(),
    ));
    let sync = CatalogSync::new(provider, catalog.clone());

    let refresh_task = spawn_refresh_task(sync.clone(), interactions.clone(), config.clone());

    let state = AppState::new(accounts, catalog, interactions, assembler, sync);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh_task.abort();
    cache_writer.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    // SIGTERM matters in containers; ctrl-c everywhere else
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
