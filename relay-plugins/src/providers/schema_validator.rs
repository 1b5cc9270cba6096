use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::error::FieldError;
use relay_core::RelayError;
use relay_plugin::capability::{CapabilityKind, SchemaValidator};
use relay_plugin::manager::{Capability, Provider, Releaser};
use serde_json::Value;

/// Validates a request body against a schema selected by URL path (C4).
/// Compiled validators are cached per path after first use; schema files
/// live under `schema_dir` as `{normalized path}.json`.
pub struct JsonSchemaValidator {
    schema_dir: PathBuf,
    cache: DashMap<String, Arc<jsonschema::Validator>>,
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.replace('/', "_")
    }
}

impl JsonSchemaValidator {
    pub fn new(schema_dir: PathBuf) -> Self {
        Self {
            schema_dir,
            cache: DashMap::new(),
        }
    }

    fn compiled_for(&self, path: &str) -> Result<Arc<jsonschema::Validator>, RelayError> {
        let key = normalize_path(path);
        if let Some(existing) = self.cache.get(&key) {
            return Ok(Arc::clone(&existing));
        }

        let file = self.schema_dir.join(format!("{key}.json"));
        let raw = std::fs::read_to_string(&file)
            .map_err(|e| RelayError::Internal(format!("no schema registered for path {path:?} ({}): {e}", file.display())))?;
        let schema: Value = serde_json::from_str(&raw)?;
        let compiled = jsonschema::validator_for(&schema)
            .map_err(|e| RelayError::Internal(format!("schema for {path:?} does not compile: {e}")))?;
        let compiled = Arc::new(compiled);
        self.cache.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }
}

#[async_trait]
impl SchemaValidator for JsonSchemaValidator {
    async fn validate(&self, path: &str, body: &[u8]) -> Result<(), RelayError> {
        let validator = self.compiled_for(path)?;

        let instance: Value = serde_json::from_slice(body).map_err(|_| RelayError::SchemaValidation {
            message: "body is not valid JSON".to_string(),
            paths: Vec::new(),
        })?;

        let errors: Vec<FieldError> = validator
            .iter_errors(&instance)
            .map(|e| FieldError {
                path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RelayError::SchemaValidation {
                message: format!("{} schema violation(s)", errors.len()),
                paths: errors,
            })
        }
    }
}

/// Config key naming the directory holding per-path schema files.
pub struct SchemaValidatorProvider;

#[async_trait]
impl Provider for SchemaValidatorProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::SchemaValidator
    }

    async fn build(&self, config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        let dir = config
            .get("schemaDir")
            .ok_or_else(|| RelayError::Config("schemaValidator plugin requires a schemaDir config entry".into()))?;
        let dir = PathBuf::from(dir);
        if !dir.is_dir() {
            return Err(RelayError::Config(format!("schemaDir {} is not a directory", dir.display())));
        }
        Ok((Capability::SchemaValidator(Arc::new(JsonSchemaValidator::new(dir))), None))
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_path;

    #[test]
    fn normalizes_slashes_and_empty_path() {
        assert_eq!(normalize_path("/search"), "search");
        assert_eq!(normalize_path("/v1/on_search"), "v1_on_search");
        assert_eq!(normalize_path("/"), "root");
    }
}
