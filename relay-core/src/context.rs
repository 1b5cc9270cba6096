use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::route::Route;

/// The role this adapter instance is acting as for the current request.
/// Determines which header a `sign` step writes the signature to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Bap,
    Bpp,
    Gateway,
    Registry,
}

/// Framework-agnostic carrier for values threaded through every step and every
/// outbound call: correlation id, and anything middleware injects. Kept free of
/// any HTTP-framework type so the pipeline core does not depend on axum.
#[derive(Debug, Clone, Default)]
pub struct AmbientContext {
    /// Carried for log/trace correlation. Populated by middleware if present;
    /// absent otherwise (never synthesized by the core itself).
    pub message_id: Option<String>,
    pub values: HashMap<String, Value>,
}

impl AmbientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message_id(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            values: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }
}

/// The per-request unit of work passed between steps. Created once by the
/// pipeline at request entry; `body` is materialized into a byte buffer and may
/// be replaced by any step; `route` stays `None` until a route-resolving step
/// sets it; the context is dropped when the handler returns.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub ambient: AmbientContext,
    pub method: String,
    pub uri: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub response_headers: HashMap<String, String>,
    pub sub_id: String,
    pub role: Role,
    pub route: Option<Route>,
}

impl StepContext {
    pub fn new(method: impl Into<String>, uri: impl Into<String>, sub_id: impl Into<String>, role: Role) -> Self {
        Self {
            ambient: AmbientContext::new(),
            method: method.into(),
            uri: uri.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            response_headers: HashMap::new(),
            sub_id: sub_id.into(),
            role,
            route: None,
        }
    }

    /// Case-insensitive header lookup, matching HTTP semantics.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn set_response_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response_headers.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut ctx = StepContext::new("POST", "/handler", "np-1", Role::Bap);
        ctx.set_header("Authorization", "Signature foo");
        assert_eq!(ctx.header("authorization"), Some("Signature foo"));
        assert_eq!(ctx.header("AUTHORIZATION"), Some("Signature foo"));
    }

    #[test]
    fn route_starts_unset() {
        let ctx = StepContext::new("POST", "/handler", "np-1", Role::Bap);
        assert!(ctx.route.is_none());
    }
}
