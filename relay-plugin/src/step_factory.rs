use std::sync::Arc;

use async_trait::async_trait;
use relay_core::RelayError;

use crate::capability::{Cache, KeyManager, Publisher, RouteResolver, SchemaValidator, SignValidator, Signer, Step};

/// The capability instances a handler's declared `plugins` bindings resolved
/// to, handed to a built-in step factory so it can pick the ones it needs and
/// fail Build if a required one is absent (§4.2 Build-time validation).
#[derive(Clone, Default)]
pub struct ResolvedCapabilities {
    pub signer: Option<Arc<dyn Signer>>,
    pub sign_validator: Option<Arc<dyn SignValidator>>,
    pub schema_validator: Option<Arc<dyn SchemaValidator>>,
    pub router: Option<Arc<dyn RouteResolver>>,
    pub publisher: Option<Arc<dyn Publisher>>,
    pub cache: Option<Arc<dyn Cache>>,
    pub key_manager: Option<Arc<dyn KeyManager>>,
}

/// Process-wide policy knobs a built-in step factory may need at Build time
/// (e.g. the sign-validator expiry enforcement flag, §9 Open Questions).
#[derive(Clone, Copy)]
pub struct StepBuildOptions {
    pub enforce_signature_expiry: bool,
}

impl Default for StepBuildOptions {
    fn default() -> Self {
        Self {
            enforce_signature_expiry: true,
        }
    }
}

/// Builds one built-in step instance from the capabilities resolved for a
/// handler. Registered under the built-in vocabulary name it serves
/// (`sign`, `validateSign`, `validateSchema`, `addRoute`, `broadcast`).
#[async_trait]
pub trait StepFactory: Send + Sync {
    async fn build(&self, caps: &ResolvedCapabilities, opts: &StepBuildOptions) -> Result<Arc<dyn Step>, RelayError>;
}

pub fn missing_capability(step: &str, capability: &str) -> RelayError {
    RelayError::Config(format!("step {step:?} requires capability {capability:?}, which was not bound"))
}
