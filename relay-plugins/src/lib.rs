pub mod providers;
pub mod steps;

use std::collections::HashMap;
use std::sync::Arc;

use relay_plugin::StepFactory;

pub use providers::key_manager::{CachingKeyManager, KeyManagerProvider};
pub use providers::publisher::{LoggingPublisher, LoggingPublisherProvider};
pub use providers::router::{ExactMatchRouter, RouterProvider};
pub use providers::schema_validator::{JsonSchemaValidator, SchemaValidatorProvider};
pub use providers::sign_validator::{Ed25519SignValidator, Ed25519SignValidatorProvider};
pub use providers::signer::{Ed25519Signer, Ed25519SignerProvider};

pub use steps::add_route::AddRouteStepFactory;
pub use steps::broadcast::BroadcastStepFactory;
pub use steps::sign::SignStepFactory;
pub use steps::validate_schema::ValidateSchemaStepFactory;
pub use steps::validate_sign::ValidateSignStepFactory;

/// The built-in step vocabulary (§4.2), keyed by the name a handler's `steps`
/// list may declare.
pub fn builtin_step_factories() -> HashMap<String, Arc<dyn StepFactory>> {
    let mut map: HashMap<String, Arc<dyn StepFactory>> = HashMap::new();
    map.insert("sign".to_string(), Arc::new(SignStepFactory));
    map.insert("validateSign".to_string(), Arc::new(ValidateSignStepFactory));
    map.insert("validateSchema".to_string(), Arc::new(ValidateSchemaStepFactory));
    map.insert("addRoute".to_string(), Arc::new(AddRouteStepFactory));
    map.insert("broadcast".to_string(), Arc::new(BroadcastStepFactory));
    map
}
