use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH};
use relay_core::RelayError;
use relay_plugin::capability::{CapabilityKind, SignValidator};
use relay_plugin::manager::{Capability, Provider, Releaser};

/// The inverse of [`super::signer::Ed25519Signer`] (§4.5). Pure signature
/// verification only; expiry enforcement is a `validateSign` step policy, not
/// this capability's concern.
pub struct Ed25519SignValidator;

#[async_trait]
impl SignValidator for Ed25519SignValidator {
    async fn validate(&self, signing_string: &[u8], signature_b64: &str, public_key_b64: &str) -> Result<(), RelayError> {
        let key_raw = B64
            .decode(public_key_b64)
            .map_err(|e| RelayError::SignatureValidation(format!("public key is not valid base64: {e}")))?;
        let key_bytes: [u8; PUBLIC_KEY_LENGTH] = key_raw
            .as_slice()
            .try_into()
            .map_err(|_| RelayError::SignatureValidation(format!("public key must be {PUBLIC_KEY_LENGTH} bytes")))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| RelayError::SignatureValidation(format!("invalid public key: {e}")))?;

        let sig_raw = B64
            .decode(signature_b64)
            .map_err(|e| RelayError::SignatureValidation(format!("signature is not valid base64: {e}")))?;
        let signature = Signature::from_slice(&sig_raw)
            .map_err(|e| RelayError::SignatureValidation(format!("malformed signature: {e}")))?;

        verifying_key
            .verify(signing_string, &signature)
            .map_err(|_| RelayError::SignatureValidation("signature does not match".into()))
    }
}

pub struct Ed25519SignValidatorProvider;

#[async_trait]
impl Provider for Ed25519SignValidatorProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::SignValidator
    }

    async fn build(&self, _config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        Ok((
            Capability::SignValidator(std::sync::Arc::new(Ed25519SignValidator)),
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer as _, SigningKey};

    #[tokio::test]
    async fn round_trips_with_signer() {
        let seed = [3u8; 32];
        let signing_key = SigningKey::from_bytes(&seed);
        let sig = signing_key.sign(b"message");
        let pk_b64 = B64.encode(signing_key.verifying_key().to_bytes());
        let sig_b64 = B64.encode(sig.to_bytes());

        let validator = Ed25519SignValidator;
        assert!(validator.validate(b"message", &sig_b64, &pk_b64).await.is_ok());
        assert!(validator.validate(b"tampered", &sig_b64, &pk_b64).await.is_err());
    }
}
