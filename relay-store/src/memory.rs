use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::RelayError;
use relay_plugin::capability::{Cache, CapabilityKind};
use relay_plugin::manager::{Capability, Provider, Releaser};

/// `DashMap`-backed cache with expiry checked lazily on read (§4.13).
pub struct InMemoryCache {
    entries: DashMap<String, (Vec<u8>, Option<Instant>)>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, RelayError> {
        let Some(entry) = self.entries.get(key) else {
            return Err(RelayError::NotFound(format!("cache key {key:?} not found")));
        };
        let (value, expires_at) = entry.value().clone();
        if let Some(expires_at) = expires_at {
            if Instant::now() >= expires_at {
                drop(entry);
                self.entries.remove(key);
                return Err(RelayError::NotFound(format!("cache key {key:?} not found")));
            }
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), RelayError> {
        let expires_at = if ttl.is_zero() { None } else { Some(Instant::now() + ttl) };
        self.entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }
}

pub struct InMemoryCacheProvider;

#[async_trait]
impl Provider for InMemoryCacheProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::Cache
    }

    async fn build(&self, _config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        Ok((Capability::Cache(Arc::new(InMemoryCache::new())), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_on_unknown_key_is_not_found() {
        let cache = InMemoryCache::new();
        assert!(matches!(cache.get("nope").await, Err(RelayError::NotFound(_))));
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = InMemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), b"v".to_vec());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_not_found() {
        let cache = InMemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(cache.get("k").await, Err(RelayError::NotFound(_))));
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let cache = InMemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), b"v".to_vec());
    }
}
