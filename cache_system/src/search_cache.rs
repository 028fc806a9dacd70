//! Search cache interface and key derivation

use crate::errors::CacheError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Store for serialized search results, keyed by [`query_key`]
#[async_trait]
pub trait SearchCache: Send + Sync {
    /// Prefix shared by every key this cache produces
    fn prefix(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: &Value) -> Result<(), CacheError>;

    /// Remove one entry; returns whether it existed
    async fn evict(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every entry under this cache's prefix; returns how many were removed
    async fn clear(&self) -> Result<u64, CacheError>;

    /// Key for a query against `table`
    fn key_for(&self, table: &str, query: &Value) -> String {
        query_key(self.prefix(), table, query)
    }
}

/// Generate cache key for query results
pub fn query_key(prefix: &str, table: &str, query: &Value) -> String {
    format!("{}:{}:query:{}", prefix, table, hash_query(query))
}

/// Hash of the canonical form of `query`; object key order does not matter
pub fn hash_query(query: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    canonical_json(query).hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Compact JSON text with object keys sorted at every level
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (index, (key, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(values) => {
            out.push('[');
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(value, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": [3, {"z": 1, "y": 2}], "c": null}});

        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":null,"d":[3,{"y":2,"z":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_query_key_layout() {
        let query = json!({"conditions": []});
        let key = query_key("querykit", "car_listings", &query);

        assert!(key.starts_with("querykit:car_listings:query:"));
        assert_eq!(key, query_key("querykit", "car_listings", &query));
        assert_ne!(key, query_key("querykit", "dealers", &query));
    }

    #[test]
    fn test_array_order_is_significant() {
        assert_ne!(hash_query(&json!(["BMW", "Audi"])), hash_query(&json!(["Audi", "BMW"])));
    }
}
