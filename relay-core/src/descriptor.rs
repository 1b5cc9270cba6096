use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `{id, config}`: identifies a plugin and the string-keyed configuration its
/// provider factory receives. A capability registry maps `id -> provider`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_has_empty_config() {
        let d = PluginDescriptor::new("nop-signer");
        assert!(d.config.is_empty());
    }

    #[test]
    fn deserializes_from_bare_string_or_mapping() {
        let d: PluginDescriptor = serde_json::from_value(serde_json::json!({
            "id": "ed25519-signer",
            "config": {"archivePath": "/var/relay/keys"}
        }))
        .unwrap();
        assert_eq!(d.id, "ed25519-signer");
        assert_eq!(d.config.get("archivePath").unwrap(), "/var/relay/keys");
    }
}
