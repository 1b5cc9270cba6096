use std::time::Duration;

use async_trait::async_trait;
use relay_core::{KeyBundle, RelayError, Route};

/// The capability kinds a plugin may provide, matching §1's enumerated list.
/// Used both to tag a [`crate::manager::Provider`] and to report
/// "capability X could not be resolved" errors at Build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Signer,
    SignValidator,
    SchemaValidator,
    Router,
    Publisher,
    Cache,
    KeyManager,
    Step,
    Middleware,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Signer => "signer",
            CapabilityKind::SignValidator => "signValidator",
            CapabilityKind::SchemaValidator => "schemaValidator",
            CapabilityKind::Router => "router",
            CapabilityKind::Publisher => "publisher",
            CapabilityKind::Cache => "cache",
            CapabilityKind::KeyManager => "keyManager",
            CapabilityKind::Step => "step",
            CapabilityKind::Middleware => "middleware",
        }
    }
}

/// Builds and verifies an HTTP signature header over a hashed payload (C3).
/// Operates purely on bytes; the `sign` step owns resolving key material and
/// building the outbound header value.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs `signing_string` with the base64-encoded private key, returning a
    /// base64-encoded signature. Fails with `RelayError::Internal` if the
    /// decoded private key is not a valid Ed25519 private key.
    async fn sign(&self, signing_string: &[u8], private_key_b64: &str) -> Result<String, RelayError>;
}

/// The inverse of [`Signer`]: verifies a base64 signature against a
/// base64-encoded public key (C3).
#[async_trait]
pub trait SignValidator: Send + Sync {
    async fn validate(
        &self,
        signing_string: &[u8],
        signature_b64: &str,
        public_key_b64: &str,
    ) -> Result<(), RelayError>;
}

/// Validates a request body against a schema chosen by URL path (C4). A
/// rejection MUST return `RelayError::SchemaValidation` carrying the failing
/// field paths.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(&self, path: &str, body: &[u8]) -> Result<(), RelayError>;
}

/// Inspects body content and picks a routing decision (C5).
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// Resolves `action` (from `context.action` in the body) to a [`Route`].
    /// Returns `RelayError::BadRequest` when `action` has no matching rule.
    async fn resolve(&self, action: &str) -> Result<Route, RelayError>;
}

/// Publishes a body to a named topic (C8's publisher branch). Concrete
/// backends (message bus drivers) are out of this core's scope; this trait is
/// the interface the core consumes.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), RelayError>;
}

/// The shared cache interface the key-manager and control-plane handlers
/// consume (§4.7). `get` distinguishes a miss via `RelayError::NotFound`
/// rather than any other error kind.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, RelayError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), RelayError>;
}

/// Owns subscriber key pairs; fetches public keys from the registry and caches
/// them (C6, §4.7).
#[async_trait]
pub trait KeyManager: Send + Sync {
    async fn generate_key_pairs(&self) -> Result<KeyBundle, RelayError>;
    async fn store_private_keys(&self, sub_id: &str, bundle: &KeyBundle) -> Result<(), RelayError>;
    /// Never contacts the registry; lookup from the cache only.
    async fn signing_private_key(&self, sub_id: &str) -> Result<(String, String), RelayError>;
    /// On cache miss, queries the registry client, populates the cache, and returns.
    async fn signing_public_key(&self, sub_id: &str, key_id: &str) -> Result<String, RelayError>;
}

/// A unit of work in the pipeline with a single `run` contract (§4.2, §4.3).
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, ctx: &mut relay_core::StepContext) -> Result<(), RelayError>;
}
