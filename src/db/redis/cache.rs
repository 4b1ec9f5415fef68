use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

/// Cache keys for metadata provider responses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Movie search results for a free-text query
    Search(String),
    /// Full detail (with cast) for one external id
    Detail(String),
    /// The provider's trending feed
    Trending,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Search(query) => write!(f, "search:{}", query.to_lowercase()),
            CacheKey::Detail(external_id) => write!(f, "detail:{}", external_id),
            CacheKey::Trending => write!(f, "trending"),
        }
    }
}

/// Creates a Redis client for caching provider responses
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

struct PendingWrite {
    key: String,
    value: String,
    ttl: u64,
}

/// Read-through cache over Redis with non-blocking writes
///
/// Reads go straight to Redis; writes are handed to a background task via a
/// channel so a slow Redis never delays an API response. A lost write only
/// costs a future cache miss.
///
/// Must be constructed inside a Tokio runtime (the writer task is spawned
/// immediately).
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<PendingWrite>,
}

impl Cache {
    pub fn new(redis_client: Client) -> Self {
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<PendingWrite>();

        let client = redis_client.clone();
        tokio::spawn(async move {
            while let Some(write) = write_rx.recv().await {
                match client.get_multiplexed_async_connection().await {
                    Ok(mut conn) => {
                        let written: Result<(), redis::RedisError> =
                            conn.set_ex(&write.key, write.value, write.ttl).await;
                        if let Err(e) = written {
                            tracing::warn!(key = %write.key, error = %e, "Cache write failed");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(key = %write.key, error = %e, "Cache connection failed");
                    }
                }
            }
        });

        Self {
            redis_client,
            write_tx,
        }
    }

    /// Looks up a cached value, deserializing it on a hit
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

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

    /// Queues a cache write and returns immediately
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: format!("{}", key),
            value: json,
            ttl,
        };

        if self.write_tx.send(write).is_err() {
            tracing::error!(key = %key, "Cache writer task is gone; dropping write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_search_is_lowercased() {
        let key = CacheKey::Search("The MATRIX".to_string());
        assert_eq!(format!("{}", key), "search:the matrix");
    }

    #[test]
    fn test_cache_key_display_detail() {
        let key = CacheKey::Detail("27205".to_string());
        assert_eq!(format!("{}", key), "detail:27205");
    }

    #[test]
    fn test_cache_key_display_trending() {
        assert_eq!(format!("{}", CacheKey::Trending), "trending");
    }

    #[test]
    fn test_search_keys_collide_only_case_insensitively() {
        let a = format!("{}", CacheKey::Search("Inception".to_string()));
        let b = format!("{}", CacheKey::Search("inception".to_string()));
        let c = format!("{}", CacheKey::Search("Inception 2".to_string()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
