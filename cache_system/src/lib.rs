//! Cache system for search results
//!
//! This crate provides the [`SearchCache`] interface with an in-process
//! backend and a Redis backend, selected by [`CacheConfig`].

pub mod errors;
pub mod memory;
pub mod prelude;
pub mod redis_cache;
pub mod search_cache;

// Re-export centralized config
pub use config::{CacheBackend, CacheConfig};

pub use errors::CacheError;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
pub use search_cache::{canonical_json, hash_query, query_key, SearchCache};

use std::sync::Arc;

/// Build the configured cache backend; `None` when caching is disabled
pub fn build_cache(config: &CacheConfig) -> Result<Option<Arc<dyn SearchCache>>, CacheError> {
    if !config.enabled {
        return Ok(None);
    }

    let cache: Arc<dyn SearchCache> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::from_config(config)?),
        CacheBackend::Redis => Arc::new(RedisCache::new(config)?),
    };
    Ok(Some(cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_cache_builds_nothing() {
        assert!(build_cache(&CacheConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_memory_backend_from_config() {
        let cache = build_cache(&CacheConfig::memory(60, 100)).unwrap().unwrap();
        assert_eq!(cache.prefix(), "querykit");
    }
}
