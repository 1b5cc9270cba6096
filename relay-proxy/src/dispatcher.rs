use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{RelayError, Route, StepContext};
use relay_plugin::capability::Publisher;
use relay_plugin::dispatch::{DispatchOutcome, RoutingDispatcher};

/// Hop-by-hop / per-connection headers that must not be copied verbatim onto
/// the outgoing upstream request or the response we hand back to the caller.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Implements C8: single-host reverse-proxy forwarding for `url` routes,
/// publisher dispatch for `publisher` routes (§4.4).
pub struct ReverseProxyDispatcher {
    client: reqwest::Client,
    publisher: Option<Arc<dyn Publisher>>,
}

impl ReverseProxyDispatcher {
    pub fn new(client: reqwest::Client, publisher: Option<Arc<dyn Publisher>>) -> Self {
        Self { client, publisher }
    }

    async fn forward(&self, ctx: &StepContext, target: &url::Url) -> Result<DispatchOutcome, RelayError> {
        let method = reqwest::Method::from_bytes(ctx.method.as_bytes())
            .map_err(|e| RelayError::Internal(format!("invalid method {:?}: {e}", ctx.method)))?;

        let mut req = self.client.request(method, target.clone()).body(ctx.body.clone());
        for (name, value) in &ctx.headers {
            if !is_hop_by_hop(name) {
                req = req.header(name, value);
            }
        }
        if let Some(host) = ctx.header("Host") {
            req = req.header("X-Forwarded-Host", host);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RelayError::Internal(format!("upstream request to {target} failed: {e}")))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| RelayError::Internal(format!("failed to read upstream response body: {e}")))?;

        let mut builder = axum::response::Response::builder().status(status);
        for (name, value) in headers.iter() {
            if !is_hop_by_hop(name.as_str()) {
                builder = builder.header(name, value);
            }
        }
        let response = builder
            .body(axum::body::Body::from(body))
            .map_err(|e| RelayError::Internal(format!("failed to build upstream response: {e}")))?;

        Ok(DispatchOutcome::Forwarded(response))
    }

    async fn publish(&self, ctx: &StepContext, topic: &str) -> Result<DispatchOutcome, RelayError> {
        let publisher = self
            .publisher
            .as_ref()
            .ok_or_else(|| RelayError::Internal("route resolved to a publisher but none is configured".into()))?;
        publisher.publish(topic, &ctx.body).await?;
        Ok(DispatchOutcome::Published)
    }
}

#[async_trait]
impl RoutingDispatcher for ReverseProxyDispatcher {
    async fn dispatch(&self, ctx: &StepContext) -> Result<DispatchOutcome, RelayError> {
        match &ctx.route {
            Some(Route::Url(target)) => self.forward(ctx, target).await,
            Some(Route::Publisher(topic)) => self.publish(ctx, topic).await,
            None => Err(RelayError::Internal("dispatch invoked without a route set".into())),
        }
    }
}
