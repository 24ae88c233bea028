use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flickswipe_api::{
    config::{Config, StorageBackend},
    db::{self, CacheWriterHandle},
    routes::{create_router, AppState},
    services::{MemoryPageCache, PageCache},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flickswipe_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (page_cache, cache_writer): (Arc<dyn PageCache>, Option<CacheWriterHandle>) =
        match &config.redis_url {
            Some(redis_url) => {
                let client = db::create_redis_client(redis_url)?;
                let (cache, handle) = db::Cache::new(client, config.feed_cache_ttl_secs).await;
                tracing::info!("Feed pages cached in Redis");
                let cache: Arc<dyn PageCache> = Arc::new(cache);
                (cache, Some(handle))
            }
            None => {
                tracing::info!("REDIS_URL not set, caching feed pages in process");
                let ttl = Duration::from_secs(config.feed_cache_ttl_secs);
                let cache: Arc<dyn PageCache> = Arc::new(MemoryPageCache::new(ttl));
                (cache, None)
            }
        };

    let state = match config.storage {
        StorageBackend::Postgres => {
            let pool = db::create_pool(&config.database_url).await?;
            if config.run_migrations {
                db::run_migrations(&pool).await?;
            }
            AppState::new(db::PgStore::new(pool), page_cache, &config)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            AppState::new(db::MemoryStore::new(), page_cache, &config)
        }
    };

    let app = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, storage = ?config.storage, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
