use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{RelayError, StepContext};
use relay_plugin::capability::{SchemaValidator, Step};
use relay_plugin::step_factory::{missing_capability, ResolvedCapabilities, StepBuildOptions, StepFactory};

/// Validates the request body against the schema selected by URL path (§4.3 validateSchema).
pub struct ValidateSchemaStep {
    validator: Arc<dyn SchemaValidator>,
}

#[async_trait]
impl Step for ValidateSchemaStep {
    fn name(&self) -> &str {
        "validateSchema"
    }

    async fn run(&self, ctx: &mut StepContext) -> Result<(), RelayError> {
        self.validator.validate(&ctx.uri, &ctx.body).await
    }
}

pub struct ValidateSchemaStepFactory;

#[async_trait]
impl StepFactory for ValidateSchemaStepFactory {
    async fn build(&self, caps: &ResolvedCapabilities, _opts: &StepBuildOptions) -> Result<Arc<dyn Step>, RelayError> {
        let validator = caps
            .schema_validator
            .clone()
            .ok_or_else(|| missing_capability("validateSchema", "schemaValidator"))?;
        Ok(Arc::new(ValidateSchemaStep { validator }))
    }
}
