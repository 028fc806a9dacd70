//! In-process search cache
//!
//! Backed by a `moka` future cache with a size bound and a cache-wide TTL.
//! Entries are not shared between processes.

use crate::errors::CacheError;
use crate::search_cache::SearchCache;
use async_trait::async_trait;
use config::CacheConfig;
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

#[derive(Clone)]
pub struct MemoryCache {
    cache: moka::future::Cache<String, Value>,
    ttl: Duration,
    prefix: String,
}

impl Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .field("ttl", &self.ttl)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl MemoryCache {
    pub fn new(ttl: Duration, max_entries: usize, prefix: &str) -> Result<Self, CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(0));
        }
        if max_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        let cache = moka::future::Cache::builder()
            .max_capacity(max_entries as u64)
            .time_to_live(ttl)
            .build();

        Ok(Self {
            cache,
            ttl,
            prefix: prefix.to_string(),
        })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Self::new(config.ttl_duration(), config.max_entries, &config.key_prefix)
    }

    /// Live entries, after pending evictions and expirations are applied
    pub async fn len(&self) -> usize {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count() as usize
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), value.clone()).await;
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let removed = self.len().await as u64;
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(removed)
    }
}
