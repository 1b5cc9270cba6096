pub mod capability;
pub mod dispatch;
pub mod manager;
pub mod middleware;
pub mod pipeline;
pub mod step_factory;

pub use capability::{Cache, CapabilityKind, KeyManager, Publisher, RouteResolver, SchemaValidator, SignValidator, Signer, Step};
pub use dispatch::{DispatchOutcome, RoutingDispatcher};
pub use manager::{Capability, PluginManager, Provider, Releaser};
pub use middleware::{Middleware, Next};
pub use pipeline::{Handler, HandlerBuilder, BUILTIN_STEP_NAMES};
pub use step_factory::{missing_capability, ResolvedCapabilities, StepBuildOptions, StepFactory};
