use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use relay_core::response::Envelope;
use relay_core::subscription::Subscription;
use relay_core::RelayError;
use serde::Deserialize;
use serde_json::Value;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct LookupBody {
    subscriber_id: String,
    #[serde(default)]
    context: Value,
}

/// `/lookUp` (§4.8): POST-only; fetch the stored subscriber record by id.
pub async fn handle(State(state): State<Arc<crate::state::AdminState>>, req: Request<Body>) -> Response {
    if req.method() != Method::POST {
        let err = RelayError::MethodNotAllowed(format!("{} not allowed on /lookUp", req.method()));
        return (StatusCode::METHOD_NOT_ALLOWED, axum::Json(Envelope::nack(Value::Null, &err, None))).into_response();
    }

    match handle_inner(&state, req).await {
        Ok(record) => (StatusCode::OK, axum::Json(serde_json::json!([record]))).into_response(),
        Err((ctx, err)) => {
            let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, axum::Json(Envelope::nack(ctx, &err, None))).into_response()
        }
    }
}

async fn handle_inner(state: &crate::state::AdminState, req: Request<Body>) -> Result<Subscription, (Value, RelayError)> {
    let bytes = to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| (Value::Null, RelayError::BadRequest(format!("failed to read body: {e}"))))?;
    let parsed: LookupBody = serde_json::from_slice(&bytes)
        .map_err(|e| (Value::Null, RelayError::BadRequest(format!("malformed lookup body: {e}"))))?;
    let ctx = parsed.context.clone();

    if parsed.subscriber_id.trim().is_empty() {
        return Err((ctx, RelayError::BadRequest("subscriber_id is required".into())));
    }

    let raw = state
        .cache
        .get(&Subscription::cache_key(&parsed.subscriber_id))
        .await
        .map_err(|e| (ctx.clone(), e))?;
    let record: Subscription = serde_json::from_slice(&raw).map_err(|e| (ctx.clone(), RelayError::Internal(e.to_string())))?;

    Ok(record)
}
