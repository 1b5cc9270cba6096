use async_trait::async_trait;
use axum::response::Response;
use relay_core::{RelayError, StepContext};

/// The result of invoking the routing dispatcher (C8) after the pipeline
/// completes. `Forwarded` carries the verbatim upstream response (status,
/// headers, body) for a `url` route; `Published` signals a successful
/// publisher send, which the pipeline turns into an ACK envelope.
pub enum DispatchOutcome {
    Forwarded(Response),
    Published,
}

/// Invoked only when `ctx.route` is non-nil (§4.4). Implemented by the routing
/// dispatcher crate and injected into the handler builder, since C8 is a
/// sibling component to the pipeline rather than a plugin capability.
#[async_trait]
pub trait RoutingDispatcher: Send + Sync {
    async fn dispatch(&self, ctx: &StepContext) -> Result<DispatchOutcome, RelayError>;
}
