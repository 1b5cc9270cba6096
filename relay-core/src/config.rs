use std::collections::HashMap;
use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::context::Role;
use crate::descriptor::PluginDescriptor;
use crate::error::RelayError;

/// Top-level configuration for the relay adapter/gateway, loaded from a YAML
/// file overlaid with `RELAY_`-prefixed environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Required process identifier; a missing or empty value is a config-load
    /// fatal error (startup only, §7 Fatal failures).
    pub app_name: String,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub plugin_manager: PluginManagerConfig,

    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Loads and validates configuration from `path`, overlaid with
    /// environment overrides. Any failure here is fatal to the process.
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let config: RelayConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .map_err(|e| RelayError::Config(format!("failed to load config from {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RelayError> {
        if self.app_name.trim().is_empty() {
            return Err(RelayError::Config("appName is required and must not be empty".into()));
        }
        if self.http.port == 0 {
            return Err(RelayError::Config("http.port is required".into()));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            app_name: "relay".to_string(),
            http: HttpConfig::default(),
            log: LogConfig::default(),
            plugin_manager: PluginManagerConfig::default(),
            modules: Vec::new(),
            signing: SigningConfig::default(),
            cache: CacheConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub timeout: TimeoutConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout: TimeoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_read_timeout_secs")]
    pub read_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: default_read_timeout_secs(),
            write_secs: default_write_timeout_secs(),
            idle_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginManagerConfig {
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub archive_path: Option<String>,
    /// Ordered sequence of plugin descriptors to register at startup; order is
    /// significant only in that each id is materialized once, fatal on miss.
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    pub path: String,
    pub handler: HandlerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandlerType {
    Std,
    RegSub,
    NpSub,
    LookUp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(rename = "type")]
    pub handler_type: HandlerType,
    #[serde(default)]
    pub registry_url: Option<String>,
    #[serde(default)]
    pub subscriber_id: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub plugins: PluginBindings,
    #[serde(default)]
    pub trace: HashMap<String, bool>,
    #[serde(default)]
    pub middleware: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginBindings {
    #[serde(default)]
    pub schema_validator: Option<String>,
    #[serde(default)]
    pub sign_validator: Option<String>,
    #[serde(default)]
    pub signer: Option<String>,
    #[serde(default)]
    pub router: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub cache: Option<String>,
    #[serde(default)]
    pub key_manager: Option<String>,
    /// Plugin ids providing non-built-in step implementations, keyed by step name.
    #[serde(default)]
    pub steps: HashMap<String, String>,
}

/// The sign-validator's expiry enforcement policy (§9 Open Questions: this
/// implementation's recorded decision). Default is fail-closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default = "default_true")]
    pub enforce_signature_expiry: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enforce_signature_expiry: default_true(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Etcd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    #[serde(default)]
    pub etcd: EtcdCacheConfig,
    /// The minimum TTL floor applied to registry-subscribe records, resolving
    /// the spec's noted TTL-vs-valid_until inconsistency (§9 Open Questions).
    #[serde(default = "default_subscriber_ttl_floor_hours")]
    pub subscriber_ttl_floor_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            etcd: EtcdCacheConfig::default(),
            subscriber_ttl_floor_hours: default_subscriber_ttl_floor_hours(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtcdCacheConfig {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_etcd_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    /// Push endpoint for batched access-log shipping. `None` disables the
    /// exporter entirely rather than running it against a no-op sink.
    #[serde(default)]
    pub access_log_endpoint: Option<String>,
    #[serde(default = "default_access_log_batch_size")]
    pub access_log_batch_size: usize,
    #[serde(default = "default_access_log_flush_interval_secs")]
    pub access_log_flush_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_true(),
            metrics_path: default_metrics_path(),
            access_log_endpoint: None,
            access_log_batch_size: default_access_log_batch_size(),
            access_log_flush_interval_secs: default_access_log_flush_interval_secs(),
        }
    }
}

/// A single router rule as loaded from the standalone router-rule YAML file (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRuleConfig {
    pub action: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterRuleFile {
    #[serde(default)]
    pub routes: Vec<RouteRuleConfig>,
}

impl RouterRuleFile {
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw)
            .map_err(|e| RelayError::Config(format!("failed to parse router rule file {}: {e}", path.display())))
    }
}

fn default_port() -> u16 {
    8080
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_write_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Memory
}

fn default_etcd_prefix() -> String {
    "/relay".to_string()
}

fn default_subscriber_ttl_floor_hours() -> u64 {
    240
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_access_log_batch_size() -> usize {
    500
}

fn default_access_log_flush_interval_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = RelayConfig::default();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.cache.subscriber_ttl_floor_hours, 240);
        assert!(config.signing.enforce_signature_expiry);
    }

    #[test]
    fn empty_app_name_fails_validation() {
        let mut config = RelayConfig::default();
        config.app_name = "".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_port_fails_validation() {
        let mut config = RelayConfig::default();
        config.http.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn handler_type_parses_from_module_vocabulary() {
        let yaml = r#"
        type: regSub
        steps: []
        "#;
        let parsed: HandlerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.handler_type, HandlerType::RegSub);
    }

    #[test]
    fn router_rule_file_parses_action_type_target() {
        let yaml = r#"
        routes:
          - action: search
            type: url
            target: https://x/y
          - action: confirm
            type: publisher
            target: orders
        "#;
        let file: RouterRuleFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.routes.len(), 2);
        assert_eq!(file.routes[0].action, "search");
        assert_eq!(file.routes[1].rule_type, "publisher");
    }
}
