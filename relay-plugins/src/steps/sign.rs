use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use blake2::digest::consts::U64;
use blake2::{Blake2b, Digest};
use chrono::Utc;
use relay_core::{RelayError, Role, StepContext};
use relay_plugin::capability::{KeyManager, Signer, Step};
use relay_plugin::step_factory::{missing_capability, ResolvedCapabilities, StepBuildOptions, StepFactory};

type Blake2b512 = Blake2b<U64>;

const SIGNATURE_LIFETIME_SECS: i64 = 300;

pub(crate) fn blake2b512_b64(body: &[u8]) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(body);
    B64.encode(hasher.finalize())
}

pub(crate) fn signing_string(created_at: i64, expires_at: i64, digest_b64: &str) -> String {
    format!("(created): {created_at}\n(expires): {expires_at}\ndigest: BLAKE-512={digest_b64}")
}

/// Signs the outgoing request with the subscriber's (or gateway's) private
/// key (§4.3 sign, §4.5).
pub struct SignStep {
    signer: Arc<dyn Signer>,
    key_manager: Arc<dyn KeyManager>,
}

#[async_trait]
impl Step for SignStep {
    fn name(&self) -> &str {
        "sign"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<(), RelayError> {
        let (key_id, private_key) = self.key_manager.signing_private_key(&ctx.sub_id).await?;

        let created_at = Utc::now().timestamp();
        let expires_at = created_at + SIGNATURE_LIFETIME_SECS;
        let digest_b64 = blake2b512_b64(&ctx.body);
        let signing_string = signing_string(created_at, expires_at, &digest_b64);

        let signature_b64 = self.signer.sign(signing_string.as_bytes(), &private_key).await?;

        let header_value = format!(
            "Signature keyId=\"{}|{}|ed25519\",algorithm=\"ed25519\",created=\"{}\",expires=\"{}\",headers=\"(created) (expires) digest\",signature=\"{}\"",
            ctx.sub_id, key_id, created_at, expires_at, signature_b64
        );

        let header_name = match ctx.role {
            Role::Gateway => "X-Gateway-Authorization",
            Role::Bap | Role::Bpp | Role::Registry => "Authorization",
        };
        ctx.set_header(header_name, header_value);
        Ok(())
    }
}

pub struct SignStepFactory;

#[async_trait]
impl StepFactory for SignStepFactory {
    async fn build(&self, caps: &ResolvedCapabilities, _opts: &StepBuildOptions) -> Result<Arc<dyn Step>, RelayError> {
        let signer = caps.signer.clone().ok_or_else(|| missing_capability("sign", "signer"))?;
        let key_manager = caps.key_manager.clone().ok_or_else(|| missing_capability("sign", "keyManager"))?;
        Ok(Arc::new(SignStep { signer, key_manager }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_string_matches_wire_format() {
        let s = signing_string(1000, 1300, "abc==");
        assert_eq!(s, "(created): 1000\n(expires): 1300\ndigest: BLAKE-512=abc==");
    }

    #[test]
    fn digest_is_stable_for_same_input() {
        assert_eq!(blake2b512_b64(b"hello"), blake2b512_b64(b"hello"));
        assert_ne!(blake2b512_b64(b"hello"), blake2b512_b64(b"world"));
    }
}
