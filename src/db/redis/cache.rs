use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::{FeedItem, SessionKey};
use crate::services::page_cache::PageCache;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Hash of cached feed pages for one browsing session
    FeedSession(SessionKey),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::FeedSession(session) => write!(f, "feed:{}", session),
        }
    }
}

/// Hash field holding the page requested at `offset` with `limit`
fn page_field(offset: i64, limit: i64) -> String {
    format!("{}:{}", offset, limit)
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes, applied in send order
enum CacheWriteMessage {
    Field {
        key: String,
        field: String,
        value: String,
        ttl: u64,
    },
    Delete {
        key: String,
    },
}

/// Redis-backed feed page cache
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
    ttl: u64,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer task to flush pending writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task.
    ///
    /// Page writes are queued to the task so serving a feed never waits on
    /// Redis. `ttl` applies to a whole session and is refreshed on each write.
    pub async fn new(redis_client: Client, ttl: u64) -> (Self, CacheWriterHandle) {
        let (cache, write_rx) = Self::with_queue(redis_client, ttl);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = cache.redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let handle = CacheWriterHandle { shutdown_tx };

        (cache, handle)
    }

    fn with_queue(
        redis_client: Client,
        ttl: u64,
    ) -> (Self, mpsc::UnboundedReceiver<CacheWriteMessage>) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let cache = Self {
            redis_client,
            write_tx,
            ttl,
        };
        (cache, write_rx)
    }

    /// Background task that processes cache write messages.
    ///
    /// On shutdown signal, flushes all remaining messages before exiting.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");
        let mut failed_writes = 0u64;

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        failed_writes += 1;
                        tracing::error!(
                            error = %e,
                            failed_writes,
                            "Failed to write to Redis cache"
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(
                                error = %e,
                                "Failed to flush cache write during shutdown"
                            );
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    /// Applies one queued write. A field write also refreshes the key's expiry.
    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        match msg {
            CacheWriteMessage::Field {
                key,
                field,
                value,
                ttl,
            } => {
                let _: () = redis::pipe()
                    .atomic()
                    .hset(&key, &field, &value)
                    .ignore()
                    .expire(&key, ttl as i64)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;
            }
            CacheWriteMessage::Delete { key } => {
                let _: () = conn.del(&key).await?;
            }
        }
        Ok(())
    }

    /// Reads and deserializes one field of a cached hash
    pub async fn get_field<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
        field: &str,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.hget(key.to_string(), field).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Queues a hash field write without waiting for Redis
    pub fn set_field_in_background<T: serde::Serialize>(
        &self,
        key: &CacheKey,
        field: &str,
        value: &T,
    ) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        self.queue(CacheWriteMessage::Field {
            key: key.to_string(),
            field: field.to_string(),
            value: json,
            ttl: self.ttl,
        });
    }

    /// Queues a key deletion behind every write already waiting
    fn queue_delete(&self, key: &CacheKey) {
        self.queue(CacheWriteMessage::Delete {
            key: key.to_string(),
        });
    }

    fn queue(&self, msg: CacheWriteMessage) {
        if self.write_tx.send(msg).is_err() {
            tracing::error!("Failed to send cache write message, writer stopped");
        }
    }

    /// Deletes a key now and again after the writes queued before this call.
    ///
    /// The immediate delete keeps reads that follow from seeing old pages.
    /// The queued one removes pages whose writes were still pending.
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        self.queue_delete(key);
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key.to_string()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageCache for Cache {
    async fn get_page(
        &self,
        session: &SessionKey,
        offset: i64,
        limit: i64,
    ) -> AppResult<Option<Vec<FeedItem>>> {
        self.get_field(&CacheKey::FeedSession(*session), &page_field(offset, limit))
            .await
    }

    async fn put_page(
        &self,
        session: &SessionKey,
        offset: i64,
        limit: i64,
        page: &[FeedItem],
    ) -> AppResult<()> {
        self.set_field_in_background(
            &CacheKey::FeedSession(*session),
            &page_field(offset, limit),
            &page,
        );
        Ok(())
    }

    async fn clear(&self, session: &SessionKey) -> AppResult<()> {
        self.invalidate(&CacheKey::FeedSession(*session)).await?;
        tracing::debug!(session = %session, "Feed cache cleared");
        Ok(())
    }
}
