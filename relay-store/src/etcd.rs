use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, GetOptions, PutOptions};
use relay_core::RelayError;
use relay_plugin::capability::{Cache, CapabilityKind};
use relay_plugin::manager::{Capability, Provider, Releaser};
use tokio::sync::Mutex;

/// `Cache` backed by etcd, scoped under a configurable key prefix (§4.13).
/// `etcd_client::Client` is cheap to clone and already `Send + Sync`; the
/// `Mutex` only serializes our own calls against a single connection handle.
pub struct EtcdCache {
    client: Mutex<Client>,
    prefix: String,
}

impl EtcdCache {
    pub async fn connect(endpoints: &[String], prefix: &str) -> Result<Self, RelayError> {
        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| RelayError::Config(format!("failed to connect to etcd at {endpoints:?}: {e}")))?;
        Ok(Self {
            client: Mutex::new(client),
            prefix: prefix.trim_end_matches('/').to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key)
    }
}

#[async_trait]
impl Cache for EtcdCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, RelayError> {
        let full_key = self.full_key(key);
        let mut client = self.client.lock().await;
        let resp = client
            .get(full_key.as_bytes(), None::<GetOptions>)
            .await
            .map_err(|e| RelayError::Internal(format!("etcd get failed: {e}")))?;
        resp.kvs()
            .first()
            .map(|kv| kv.value().to_vec())
            .ok_or_else(|| RelayError::NotFound(format!("cache key {key:?} not found")))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), RelayError> {
        let full_key = self.full_key(key);
        let mut client = self.client.lock().await;

        if ttl.is_zero() {
            client
                .put(full_key, value, None)
                .await
                .map_err(|e| RelayError::Internal(format!("etcd put failed: {e}")))?;
            return Ok(());
        }

        let lease = client
            .lease_grant(ttl.as_secs().max(1) as i64, None)
            .await
            .map_err(|e| RelayError::Internal(format!("etcd lease grant failed: {e}")))?;
        client
            .put(full_key, value, Some(PutOptions::new().with_lease(lease.id())))
            .await
            .map_err(|e| RelayError::Internal(format!("etcd put failed: {e}")))?;
        Ok(())
    }
}

/// Config keys: `endpoints` (comma-separated), `prefix`.
pub struct EtcdCacheProvider;

#[async_trait]
impl Provider for EtcdCacheProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::Cache
    }

    async fn build(&self, config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        let endpoints: Vec<String> = config
            .get("endpoints")
            .ok_or_else(|| RelayError::Config("etcd cache plugin requires an endpoints config entry".into()))?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(RelayError::Config("etcd cache plugin's endpoints list is empty".into()));
        }
        let prefix = config.get("prefix").cloned().unwrap_or_else(|| "/relay".to_string());

        let cache = EtcdCache::connect(&endpoints, &prefix).await?;
        Ok((Capability::Cache(Arc::new(cache)), None))
    }
}
