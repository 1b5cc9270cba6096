use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::RelayError;
use relay_plugin::capability::{CapabilityKind, Publisher};
use relay_plugin::manager::{Capability, Provider, Releaser};

/// Records a publish attempt via the access log rather than delivering it
/// anywhere; concrete message-bus backends are out of this core's scope (§4.3).
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), RelayError> {
        tracing::info!(topic, bytes = body.len(), "publish (no broker configured)");
        Ok(())
    }
}

pub struct LoggingPublisherProvider;

#[async_trait]
impl Provider for LoggingPublisherProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::Publisher
    }

    async fn build(&self, _config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        Ok((Capability::Publisher(Arc::new(LoggingPublisher)), None))
    }
}
