use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ed25519_dalek::{Signer as _, SigningKey, SECRET_KEY_LENGTH};
use relay_core::RelayError;
use relay_plugin::capability::{CapabilityKind, Signer};
use relay_plugin::manager::{Capability, Provider, Releaser};

/// Ed25519 over a caller-supplied signing string (§4.5). Stateless: the
/// private key arrives base64-encoded with every call.
pub struct Ed25519Signer;

#[async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, signing_string: &[u8], private_key_b64: &str) -> Result<String, RelayError> {
        let raw = B64
            .decode(private_key_b64)
            .map_err(|e| RelayError::Internal(format!("signing key is not valid base64: {e}")))?;
        let seed: [u8; SECRET_KEY_LENGTH] = raw
            .as_slice()
            .try_into()
            .map_err(|_| RelayError::Internal(format!("signing key must be {SECRET_KEY_LENGTH} bytes, got {}", raw.len())))?;
        let signing_key = SigningKey::from_bytes(&seed);
        let signature = signing_key.sign(signing_string);
        Ok(B64.encode(signature.to_bytes()))
    }
}

pub struct Ed25519SignerProvider;

#[async_trait]
impl Provider for Ed25519SignerProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::Signer
    }

    async fn build(&self, _config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        Ok((Capability::Signer(std::sync::Arc::new(Ed25519Signer)), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signs_with_valid_key_length() {
        let seed = [7u8; SECRET_KEY_LENGTH];
        let key_b64 = B64.encode(seed);
        let signer = Ed25519Signer;
        let sig = signer.sign(b"hello", &key_b64).await.unwrap();
        assert!(!sig.is_empty());
    }

    #[tokio::test]
    async fn rejects_wrong_length_key() {
        let signer = Ed25519Signer;
        let err = signer.sign(b"hello", &B64.encode(b"too-short")).await.unwrap_err();
        assert!(matches!(err, RelayError::Internal(_)));
    }
}
