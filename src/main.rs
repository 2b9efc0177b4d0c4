use std::sync::Arc;

use taste_matchmaker::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, InMemoryMatchStore, MatchStore, PgMatchStore},
    routes::{create_router, AppState},
    services::{providers::LastfmProvider, MatchRunner, RetryPolicy},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taste_matchmaker=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client);

    let provider = LastfmProvider::new(
        cache,
        config.lastfm_api_key.clone(),
        config.lastfm_api_url.clone(),
        config.top_artists_ttl_secs,
        config.profile_ttl_secs,
    )?;

    let store: Arc<dyn MatchStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Using PostgreSQL match store");
            Arc::new(PgMatchStore::new(create_pool(database_url).await?))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, matches are kept in memory");
            Arc::new(InMemoryMatchStore::new())
        }
    };

    let runner = Arc::new(MatchRunner::new(
        Arc::new(provider),
        store.clone(),
        RetryPolicy::default(),
        config.top_artist_limit,
    ));

    runner.resume_pending().await?;

    let state = Arc::new(AppState {
        runner: runner.clone(),
        store,
        inline_matching: config.inline_matching,
    });
    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runner.drain().await;
    cache_writer.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
