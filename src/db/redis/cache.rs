use std::fmt::Display;

use redis::{AsyncCommands, Client};
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};

/// Keys for cached TMDb responses
///
/// Paged endpoints carry the page number so adjacent pages cache
/// independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Trending(i32),
    Popular(i32),
    TopRated(i32),
    Upcoming(i32),
    Search { query: String, page: i32 },
    MovieDetails(i64),
    GenreList,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Trending(page) => write!(f, "trending:{}", page),
            CacheKey::Popular(page) => write!(f, "popular:{}", page),
            CacheKey::TopRated(page) => write!(f, "top_rated:{}", page),
            CacheKey::Upcoming(page) => write!(f, "upcoming:{}", page),
            CacheKey::Search { query, page } => {
                write!(f, "search:{}:{}", query.to_lowercase(), page)
            }
            CacheKey::MovieDetails(id) => write!(f, "details:{}", id),
            CacheKey::GenreList => write!(f, "genres"),
        }
    }
}

pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// One serialized value waiting for the background writer
struct PendingWrite {
    key: String,
    json: String,
    ttl: u64,
}

/// Read-through cache over Redis
///
/// Reads are synchronous with the request; writes go through an unbounded
/// channel to a background task so a slow Redis never delays a response.
#[derive(Clone)]
pub struct Cache {
    client: Client,
    writes: mpsc::UnboundedSender<PendingWrite>,
}

/// Owns the shutdown side of the writer task
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Signals the writer to flush queued writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    pub async fn new(client: Client) -> (Self, CacheWriterHandle) {
        let (writes, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(writer_task(client.clone(), write_rx, shutdown_rx));

        (
            Self { client, writes },
            CacheWriterHandle { shutdown_tx },
        )
    }

    /// Looks up and deserializes a cached value; a miss is `None`
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        cached
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))
            })
            .transpose()
    }

    /// Queues a write for the background task and returns immediately
    ///
    /// Failures are logged, never surfaced; the cache is advisory.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let pending = PendingWrite {
            key: key.to_string(),
            json,
            ttl,
        };
        if self.writes.send(pending).is_err() {
            tracing::error!("Cache writer channel closed, dropping write");
        }
    }
}

/// Drains the write channel until shutdown, then flushes what is left
async fn writer_task(
    client: Client,
    mut write_rx: mpsc::UnboundedReceiver<PendingWrite>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tracing::info!("Cache writer task started");

    loop {
        tokio::select! {
            Some(pending) = write_rx.recv() => {
                if let Err(e) = store(&client, pending).await {
                    tracing::error!(error = %e, "Failed to write to Redis cache");
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("Cache writer shutting down, flushing remaining writes");
                while let Ok(pending) = write_rx.try_recv() {
                    if let Err(e) = store(&client, pending).await {
                        tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                    }
                }
                break;
            }
        }
    }

    tracing::info!("Cache writer task stopped");
}

async fn store(client: &Client, pending: PendingWrite) -> AppResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let _: () = conn.set_ex(pending.key, pending.json, pending.ttl).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_paged_lists() {
        assert_eq!(format!("{}", CacheKey::Trending(1)), "trending:1");
        assert_eq!(format!("{}", CacheKey::Popular(3)), "popular:3");
        assert_eq!(format!("{}", CacheKey::TopRated(2)), "top_rated:2");
        assert_eq!(format!("{}", CacheKey::Upcoming(1)), "upcoming:1");
    }

    #[test]
    fn test_cache_key_display_search_lowercases_query() {
        let key = CacheKey::Search {
            query: "THE MATRIX".to_string(),
            page: 1,
        };
        assert_eq!(format!("{}", key), "search:the matrix:1");
    }

    #[test]
    fn test_cache_key_display_movie_details() {
        assert_eq!(format!("{}", CacheKey::MovieDetails(27205)), "details:27205");
    }

    #[test]
    fn test_cache_key_display_genres() {
        assert_eq!(format!("{}", CacheKey::GenreList), "genres");
    }
}
