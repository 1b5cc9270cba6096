use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::config::RouterRuleFile;
use relay_core::{RelayError, Route};
use relay_plugin::capability::{CapabilityKind, RouteResolver};
use relay_plugin::manager::{Capability, Provider, Releaser};

/// First-match-on-exact-action router (§4.6). Rule order is load order; no
/// wildcard matching.
pub struct ExactMatchRouter {
    routes: Vec<(String, Route)>,
}

#[async_trait]
impl RouteResolver for ExactMatchRouter {
    async fn resolve(&self, action: &str) -> Result<Route, RelayError> {
        self.routes
            .iter()
            .find(|(a, _)| a == action)
            .map(|(_, route)| route.clone())
            .ok_or_else(|| RelayError::BadRequest(format!("no route configured for action {action:?}")))
    }
}

/// Loads `routes: [{action, type, target}]` from the file named by config key
/// `rulesFile` at Build time; a bad target URL is fatal here, matching §4.6's
/// "parse error at Build time is fatal".
pub struct RouterProvider;

#[async_trait]
impl Provider for RouterProvider {
    fn capability_kind(&self) -> CapabilityKind {
        CapabilityKind::Router
    }

    async fn build(&self, config: &HashMap<String, String>) -> Result<(Capability, Option<Releaser>), RelayError> {
        let path = config
            .get("rulesFile")
            .ok_or_else(|| RelayError::Config("router plugin requires a rulesFile config entry".into()))?;
        let file = RouterRuleFile::load(&PathBuf::from(path))?;

        let mut routes = Vec::with_capacity(file.routes.len());
        for rule in file.routes {
            let route = match rule.rule_type.as_str() {
                "url" => Route::url(&rule.target)?,
                "publisher" => Route::publisher(rule.target.clone())?,
                other => return Err(RelayError::Config(format!("unknown route rule type {other:?} for action {:?}", rule.action))),
            };
            routes.push((rule.action, route));
        }

        Ok((Capability::Router(Arc::new(ExactMatchRouter { routes })), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_first_matching_action() {
        let router = ExactMatchRouter {
            routes: vec![
                ("search".to_string(), Route::url("https://a/search").unwrap()),
                ("confirm".to_string(), Route::publisher("orders").unwrap()),
            ],
        };
        assert_eq!(router.resolve("confirm").await.unwrap().type_name(), "publisher");
        assert!(router.resolve("cancel").await.is_err());
    }
}
