use std::sync::Arc;

use relay_plugin::{Cache, KeyManager};
use relay_store::RegistryClient;

/// Shared state for the control-plane handlers (§4.8, C9). Each handler only
/// touches the fields its flow needs; `reg_sub`/`lookup` never dereference
/// `key_manager`/`registry_client`.
#[derive(Clone)]
pub struct AdminState {
    pub cache: Arc<dyn Cache>,
    pub key_manager: Arc<dyn KeyManager>,
    pub registry_client: Arc<RegistryClient>,
    pub subscriber_ttl_floor_hours: u64,
    pub metrics: Arc<relay_observability::MetricsCollector>,
}
