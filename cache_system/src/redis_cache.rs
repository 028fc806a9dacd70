//! Redis-backed search cache
//!
//! Entries are stored as JSON strings with `SET EX`, so Redis handles expiry.

use crate::errors::CacheError;
use crate::search_cache::SearchCache;
use async_trait::async_trait;
use config::CacheConfig;
use redis::{AsyncCommands, Client};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RedisCache {
    client: Arc<Client>,
    prefix: String,
    ttl_seconds: u64,
    connection_pool: Arc<RwLock<Option<redis::aio::MultiplexedConnection>>>,
}

impl Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connection_status = {
            match self.connection_pool.try_read() {
                Ok(pool) => {
                    if pool.is_some() {
                        "connected"
                    } else {
                        "no_connection"
                    }
                }
                Err(_) => "lock_error",
            }
        };

        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("connected", &connection_status)
            .finish()
    }
}

impl RedisCache {
    /// Create a cache client; no connection is made until first use
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        if config.ttl_seconds == 0 {
            return Err(CacheError::InvalidTtl(config.ttl_seconds));
        }

        let client = Client::open(config.redis_url.as_str())?;

        Ok(Self {
            client: Arc::new(client),
            prefix: config.key_prefix.clone(),
            ttl_seconds: config.ttl_seconds,
            connection_pool: Arc::new(RwLock::new(None)),
        })
    }

    /// Get or create Redis connection
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        let mut pool = self.connection_pool.write().await;

        if pool.is_none() {
            let connection = self.client.get_multiplexed_async_connection().await?;
            *pool = Some(connection);
        }

        Ok(pool
            .as_ref()
            .ok_or_else(|| CacheError::Connection("Failed to get connection from pool".into()))?
            .clone())
    }

    fn query_pattern(&self) -> String {
        format!("{}:*:query:*", self.prefix)
    }

    /// Remaining TTL of a key in seconds (-2 when missing)
    pub async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.get_connection().await?;
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<String, CacheError> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }
}

#[async_trait]
impl SearchCache for RedisCache {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.get_connection().await?;

        let cached_data: Option<String> = conn.get(key).await?;

        match cached_data {
            Some(json_str) => Ok(Some(serde_json::from_str(&json_str)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        let json_str = serde_json::to_string(value)?;
        let mut conn = self.get_connection().await?;

        let _: () = conn.set_ex(key, &json_str, self.ttl_seconds).await?;
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;

        let deleted: i32 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let mut conn = self.get_connection().await?;

        let keys: Vec<String> = conn.keys(self.query_pattern()).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn.del(keys).await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_does_not_connect() {
        let config = CacheConfig::redis("redis://127.0.0.1:6379".to_string(), 60);
        let cache = RedisCache::new(&config).unwrap();

        assert_eq!(cache.prefix(), "querykit");
        assert!(format!("{:?}", cache).contains("no_connection"));
        assert_eq!(cache.query_pattern(), "querykit:*:query:*");
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let config = CacheConfig::redis("redis://127.0.0.1:6379".to_string(), 0);
        assert!(matches!(RedisCache::new(&config), Err(CacheError::InvalidTtl(0))));
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = CacheConfig::redis("not a url".to_string(), 60);
        assert!(RedisCache::new(&config).is_err());
    }

    #[test]
    fn test_keys_are_shared_with_memory_backend() {
        let config = CacheConfig::redis("redis://127.0.0.1:6379".to_string(), 60);
        let cache = RedisCache::new(&config).unwrap();
        let query = json!({"pagination": {"page": 1, "limit": 12}});

        assert_eq!(
            cache.key_for("car_listings", &query),
            crate::query_key("querykit", "car_listings", &query)
        );
    }
}
