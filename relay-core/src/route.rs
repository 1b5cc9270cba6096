use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RelayError;

/// The outbound decision set by a route-resolving step: either a reverse-proxy
/// target or a publisher topic. Modeled as a sum type rather than a struct with
/// nullable fields, since exactly one of the two is ever meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Url(Url),
    Publisher(String),
}

impl Route {
    pub fn url(target: &str) -> Result<Self, RelayError> {
        let parsed = Url::parse(target)
            .map_err(|e| RelayError::Config(format!("route target {target:?} is not an absolute URL: {e}")))?;
        Ok(Route::Url(parsed))
    }

    pub fn publisher(topic: impl Into<String>) -> Result<Self, RelayError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(RelayError::Config("publisher route topic must not be empty".into()));
        }
        Ok(Route::Publisher(topic))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Route::Url(_) => "url",
            Route::Publisher(_) => "publisher",
        }
    }
}

/// Wire representation of [`Route`] used in router-rule YAML and any place a
/// route decision needs to be serialized (e.g. test fixtures, logging).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteWire {
    Url { url: String },
    Publisher { publisher_topic: String },
}

impl TryFrom<RouteWire> for Route {
    type Error = RelayError;

    fn try_from(wire: RouteWire) -> Result<Self, Self::Error> {
        match wire {
            RouteWire::Url { url } => Route::url(&url),
            RouteWire::Publisher { publisher_topic } => Route::publisher(publisher_topic),
        }
    }
}

impl From<&Route> for RouteWire {
    fn from(route: &Route) -> Self {
        match route {
            Route::Url(url) => RouteWire::Url { url: url.to_string() },
            Route::Publisher(topic) => RouteWire::Publisher {
                publisher_topic: topic.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_route_requires_absolute_url() {
        assert!(Route::url("not-a-url").is_err());
        assert!(Route::url("https://upstream/search").is_ok());
    }

    #[test]
    fn publisher_route_requires_non_empty_topic() {
        assert!(Route::publisher("").is_err());
        assert!(Route::publisher("orders").is_ok());
    }

    #[test]
    fn wire_roundtrip_preserves_variant() {
        let route = Route::url("https://x/y").unwrap();
        let wire = RouteWire::from(&route);
        let back: Route = wire.try_into().unwrap();
        assert_eq!(back, route);
    }

    #[test]
    fn type_name_matches_spec_vocabulary() {
        assert_eq!(Route::url("https://x/y").unwrap().type_name(), "url");
        assert_eq!(Route::publisher("t").unwrap().type_name(), "publisher");
    }
}
