pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod keys;
pub mod response;
pub mod route;
pub mod subscription;

pub use config::RelayConfig;
pub use context::{Role, StepContext};
pub use descriptor::PluginDescriptor;
pub use error::{ErrorKind, RelayError};
pub use keys::KeyBundle;
pub use response::{Envelope, ErrorBody};
pub use route::Route;
pub use subscription::{Subscription, SubscriptionStatus};
