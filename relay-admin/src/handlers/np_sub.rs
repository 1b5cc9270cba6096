use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use relay_core::response::Envelope;
use relay_core::subscription::ParticipantType;
use relay_core::RelayError;
use relay_plugin::KeyManager;
use serde::Deserialize;
use serde_json::Value;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const VALID_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Deserialize)]
struct NpSubscribeBody {
    subscriber_id: String,
    url: String,
    #[serde(rename = "type", default = "default_participant_type")]
    participant_type: ParticipantType,
    #[serde(default)]
    context: Value,
}

fn default_participant_type() -> ParticipantType {
    ParticipantType::Bpp
}

/// Client-side `/subscribe` (§4.8): POST-only; generate keys, register with
/// the configured registry, persist private material on success.
pub async fn handle(State(state): State<Arc<crate::state::AdminState>>, req: Request<Body>) -> Response {
    if req.method() != Method::POST {
        let err = RelayError::MethodNotAllowed(format!("{} not allowed on /subscribe", req.method()));
        return (StatusCode::METHOD_NOT_ALLOWED, axum::Json(Envelope::nack(Value::Null, &err, None))).into_response();
    }

    match handle_inner(&state, req).await {
        Ok(ctx) => (StatusCode::OK, axum::Json(Envelope::ack(ctx))).into_response(),
        Err((ctx, err)) => {
            let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, axum::Json(Envelope::nack(ctx, &err, None))).into_response()
        }
    }
}

async fn handle_inner(state: &crate::state::AdminState, req: Request<Body>) -> Result<Value, (Value, RelayError)> {
    let bytes = to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| (Value::Null, RelayError::BadRequest(format!("failed to read body: {e}"))))?;
    let parsed: NpSubscribeBody = serde_json::from_slice(&bytes)
        .map_err(|e| (Value::Null, RelayError::BadRequest(format!("malformed subscribe body: {e}"))))?;
    let ctx = parsed.context.clone();

    if parsed.subscriber_id.trim().is_empty() || parsed.url.trim().is_empty() {
        return Err((ctx, RelayError::BadRequest("subscriber_id and url are required".into())));
    }

    let bundle = state.key_manager.generate_key_pairs().await.map_err(|e| (ctx.clone(), e))?;

    let now = Utc::now();
    let kind = match parsed.participant_type {
        ParticipantType::Bap => "BAP",
        ParticipantType::Bpp => "BPP",
        ParticipantType::Bg => "BG",
    };
    state
        .registry_client
        .subscribe(
            &parsed.subscriber_id,
            &parsed.url,
            kind,
            &bundle,
            now,
            now + chrono::Duration::hours(VALID_WINDOW_HOURS),
        )
        .await
        .map_err(|e| (ctx.clone(), e))?;

    state
        .key_manager
        .store_private_keys(&parsed.subscriber_id, &bundle)
        .await
        .map_err(|e| (ctx.clone(), e))?;

    Ok(ctx)
}
