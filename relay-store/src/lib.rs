pub mod memory;
pub mod registry_client;

#[cfg(feature = "etcd")]
pub mod etcd;

pub use memory::{InMemoryCache, InMemoryCacheProvider};
pub use registry_client::{RegistryClient, RetryStrategyConfig};

#[cfg(feature = "etcd")]
pub use etcd::{EtcdCache, EtcdCacheProvider};
