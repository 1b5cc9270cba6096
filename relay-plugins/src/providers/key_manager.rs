use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use relay_core::{KeyBundle, RelayError, Subscription};
use relay_plugin::capability::{Cache, CapabilityKind, KeyManager};
use relay_plugin::manager::{Capability, Provider, Releaser};
use relay_store::RegistryClient;
use uuid::Uuid;

/// Owns subscriber key material behind the shared cache (§4.7). Never talks to
/// the registry except on a public-key cache miss.
pub struct CachingKeyManager {
    cache: Arc<dyn Cache>,
    registry_client: Option<Arc<RegistryClient>>,
    private_ttl: Duration,
    public_ttl: Duration,
}

impl CachingKeyManager {
    pub fn new(
        cache: Arc<dyn Cache>,
        registry_client: Option<Arc<RegistryClient>>,
        private_ttl: Duration,
        public_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            registry_client,
            private_ttl,
            public_ttl,
        }
    }
}

#[async_trait]
impl KeyManager for CachingKeyManager {
    async fn generate_key_pairs(&self) -> Result<KeyBundle, RelayError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        // Encryption key exchange is out of this core's scope; a second Ed25519
        // pair fills encr_* so the bundle shape matches the registry record.
        let encr_key = SigningKey::generate(&mut OsRng);

        Ok(KeyBundle {
            unique_key_id: format!("key-{}", Uuid::new_v4()),
            signing_public: B64.encode(signing_key.verifying_key().to_bytes()),
            signing_private: B64.encode(signing_key.to_bytes()),
            encr_public: B64.encode(encr_key.verifying_key().to_bytes()),
            encr_private: B64.encode(encr_key.to_bytes()),
        })
    }

    async fn store_private_keys(&self, sub_id: &str, bundle: &KeyBundle) -> Result<(), RelayError> {
        let bytes = serde_json::to_vec(bundle)?;
        self.cache
            .set(&Subscription::private_cache_key(sub_id), bytes, self.private_ttl)
            .await
    }

    async fn signing_private_key(&self, sub_id: &str) -> Result<(String, String), RelayError> {
        let raw = self.cache.get(&Subscription::private_cache_key(sub_id)).await?;
        let bundle: KeyBundle = serde_json::from_slice(&raw)?;
        Ok((bundle.unique_key_id, bundle.signing_private))
    }

    async fn signing_public_key(&self, sub_id: &str, key_id: &str) -> Result<String, RelayError> {
        match self.cache.get(&Subscription::cache_key(sub_id)).await {
            Ok(raw) => {
                let sub: Subscription = serde_json::from_slice(&raw)?;
                if sub.key_id == key_id {
                    return Ok(sub.signing_public_key);
                }
            }
            Err(RelayError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let registry_client = self
            .registry_client
            .as_ref()
            .ok_or_else(|| RelayError::Internal("no registry configured for public key lookup".into()))?;

        let sub = registry_client.lookup_subscription(sub_id).await?;
        if sub.key_id != key_id {
            return Err(RelayError::NotFound(format!(
                "key {key_id:?} not found for subscriber {sub_id:?}"
            )));
        }

        let bytes = serde_json::to_vec(&sub)?;
        self.cache.set(&Subscription::cache_key(sub_id), bytes, self.public_ttl).await?;
        Ok(sub.signing_public_key)
    }
}

/// Built from an already-instantiated cache capability and the shared
/// registry client, rather than resolving the cache through the plugin
/// manager itself — avoids a reference cycle between the manager and one of
/// its own providers.
pub struct KeyManagerProvider {
    cache: Arc<dyn Cache>,
    registry_client: Option<Arc<RegistryClient>>,
}

impl KeyManagerProvider {
    pub fn new(cache: Arc<dyn Cache>, registry_client: Option<Arc<RegistryClient>>) -> Self {
        Self { cache, registry_client }
    }
}

#[async_trait]
impl Provider for KeyManagerProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::KeyManager
    }

    async fn build(&self, config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        let private_ttl_hours: u64 = config
            .get("privateTtlHours")
            .and_then(|v| v.parse().ok())
            .unwrap_or(24 * 30);
        let public_ttl_hours: u64 = config.get("publicTtlHours").and_then(|v| v.parse().ok()).unwrap_or(24);

        let manager = CachingKeyManager::new(
            Arc::clone(&self.cache),
            self.registry_client.clone(),
            Duration::from_secs(private_ttl_hours * 3600),
            Duration::from_secs(public_ttl_hours * 3600),
        );
        Ok((Capability::KeyManager(Arc::new(manager)), None))
    }
}
