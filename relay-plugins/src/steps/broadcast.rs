use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{RelayError, StepContext};
use relay_plugin::capability::Step;
use relay_plugin::step_factory::{ResolvedCapabilities, StepBuildOptions, StepFactory};

/// Reserved: a no-op, kept only to preserve declared step positions (§4.3).
pub struct BroadcastStep;

#[async_trait]
impl Step for BroadcastStep {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn run(&self, _ctx: &mut StepContext) -> Result<(), RelayError> {
        Ok(())
    }
}

pub struct BroadcastStepFactory;

#[async_trait]
impl StepFactory for BroadcastStepFactory {
    async fn build(&self, _caps: &ResolvedCapabilities, _opts: &StepBuildOptions) -> Result<Arc<dyn Step>, RelayError> {
        Ok(Arc::new(BroadcastStep))
    }
}
