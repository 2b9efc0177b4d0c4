use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::Window;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    TopArtists {
        username: String,
        window: Window,
        limit: u32,
    },
    Profile(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::TopArtists {
                username,
                window,
                limit,
            } => write!(f, "top:{}:{}:{}", username.to_lowercase(), window, limit),
            CacheKey::Profile(username) => write!(f, "profile:{}", username.to_lowercase()),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Cache handler for storing and retrieving provider responses in Redis
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
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
    /// Creates a new Cache instance with a background write task
    ///
    /// Writes go through a channel so that storing a freshly fetched
    /// listening history never delays the match that needed it.
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx })
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    let key = msg.key.clone();
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, key = %key, "Failed to write to Redis cache");
                    }
                }
                Some(()) = shutdown_rx.recv() => {
                    // Drain whatever is already queued, then stop
                    write_rx.close();
                    let mut flushed = 0;
                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(
                                error = %e,
                                "Failed to flush cache write during shutdown"
                            );
                        } else {
                            flushed += 1;
                        }
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
                else => break,
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Retrieves and deserializes a cached value, `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                tracing::debug!(key = %key, "Cache hit");
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Queues a value for storage without waiting for Redis
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtistEntry;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[test]
    fn test_cache_key_display_top_artists() {
        let key = CacheKey::TopArtists {
            username: "Alice".to_string(),
            window: Window::TwelveMonth,
            limit: 300,
        };
        assert_eq!(format!("{}", key), "top:alice:12month:300");
    }

    #[test]
    fn test_cache_key_display_profile_lowercase() {
        let key = CacheKey::Profile("RJ".to_string());
        assert_eq!(format!("{}", key), "profile:rj");
    }

    #[test]
    fn test_cache_keys_differ_per_window() {
        let keys: Vec<String> = Window::ALL
            .iter()
            .map(|window| {
                CacheKey::TopArtists {
                    username: "bob".to_string(),
                    window: *window,
                    limit: 50,
                }
                .to_string()
            })
            .collect();

        assert_eq!(keys, vec!["top:bob:3month:50", "top:bob:12month:50", "top:bob:overall:50"]);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_cache_miss() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (cache, _handle) = Cache::new(client);

        let key = CacheKey::Profile("nonexistent_user_12345".to_string());
        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();

        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_set_in_background_writes_to_cache() {
        let client = create_redis_client(&redis_url()).unwrap();
        let (cache, handle) = Cache::new(client.clone());

        let key = CacheKey::TopArtists {
            username: "cache_test_user".to_string(),
            window: Window::Overall,
            limit: 2,
        };
        let value = vec![
            ArtistEntry::new("Low", None, 12),
            ArtistEntry::new("Slowdive", Some("mbid-slowdive"), 7),
        ];

        cache.set_in_background(&key, &value, 60);
        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let retrieved: Option<Vec<ArtistEntry>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(key.to_string()).await.unwrap();
    }
}
