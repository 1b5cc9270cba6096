use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{RelayError, StepContext};
use relay_plugin::capability::{RouteResolver, Step};
use relay_plugin::step_factory::{missing_capability, ResolvedCapabilities, StepBuildOptions, StepFactory};
use serde_json::Value;

/// Reads `context.action` from the body and resolves it to a route (§4.3 addRoute).
pub struct AddRouteStep {
    router: Arc<dyn RouteResolver>,
}

#[async_trait]
impl Step for AddRouteStep {
    fn name(&self) -> &str {
        "addRoute"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<(), RelayError> {
        let body: Value = serde_json::from_slice(&ctx.body).map_err(|_| RelayError::BadRequest("body is not JSON".into()))?;
        let context = body
            .get("context")
            .ok_or_else(|| RelayError::BadRequest("body is missing a context object".into()))?;
        let action = context
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::BadRequest("context.action is missing or not a string".into()))?;

        let route = self.router.resolve(action).await?;
        ctx.route = Some(route);
        Ok(())
    }
}

pub struct AddRouteStepFactory;

#[async_trait]
impl StepFactory for AddRouteStepFactory {
    async fn build(&self, caps: &ResolvedCapabilities, _opts: &StepBuildOptions) -> Result<Arc<dyn Step>, RelayError> {
        let router = caps.router.clone().ok_or_else(|| missing_capability("addRoute", "router"))?;
        Ok(Arc::new(AddRouteStep { router }))
    }
}
