use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use relay_core::response::Envelope;
use relay_core::subscription::{ParticipantType, Subscription, SubscriptionStatus};
use relay_core::RelayError;
use relay_plugin::Cache;
use serde::Deserialize;
use serde_json::Value;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const VALID_WINDOW_HOURS: i64 = 48;

#[derive(Debug, Deserialize)]
struct SubscribeBody {
    subscriber_id: String,
    url: String,
    #[serde(rename = "type", default = "default_participant_type")]
    participant_type: ParticipantType,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    key_id: String,
    signing_public_key: String,
    encr_public_key: String,
    #[serde(default)]
    context: Value,
}

fn default_participant_type() -> ParticipantType {
    ParticipantType::Bpp
}

/// Registry-side `/subscribe` (§4.8): POST-only; registers a subscriber
/// record with `status=UNDER_SUBSCRIPTION`, TTL-floored per the cache config.
pub async fn handle(State(state): State<Arc<crate::state::AdminState>>, req: Request<Body>) -> Response {
    if req.method() != Method::POST {
        let err = RelayError::MethodNotAllowed(format!("{} not allowed on /subscribe", req.method()));
        return nack(Value::Null, &err);
    }

    match handle_inner(&state, req).await {
        Ok(resp) => resp,
        Err((ctx, err)) => nack(ctx, &err),
    }
}

async fn handle_inner(
    state: &crate::state::AdminState,
    req: Request<Body>,
) -> Result<Response, (Value, RelayError)> {
    let bytes = to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| (Value::Null, RelayError::BadRequest(format!("failed to read body: {e}"))))?;
    let parsed: SubscribeBody = serde_json::from_slice(&bytes)
        .map_err(|e| (Value::Null, RelayError::BadRequest(format!("malformed subscribe body: {e}"))))?;
    let ctx = parsed.context.clone();

    if parsed.signing_public_key.trim().is_empty()
        || parsed.encr_public_key.trim().is_empty()
        || parsed.url.trim().is_empty()
    {
        return Err((
            ctx,
            RelayError::BadRequest("signing_public_key, encr_public_key, and url are required".into()),
        ));
    }

    let now = Utc::now();
    let subscription = Subscription {
        subscriber_id: parsed.subscriber_id.clone(),
        url: parsed.url,
        participant_type: parsed.participant_type,
        domain: parsed.domain,
        key_id: parsed.key_id,
        signing_public_key: parsed.signing_public_key,
        encr_public_key: parsed.encr_public_key,
        valid_from: now,
        valid_until: now + chrono::Duration::hours(VALID_WINDOW_HOURS),
        status: SubscriptionStatus::UnderSubscription,
        created: now,
        updated: now,
        nonce: uuid::Uuid::new_v4().to_string(),
    };
    subscription.validate().map_err(|e| (ctx.clone(), e))?;

    let record = serde_json::to_vec(&subscription).map_err(|e| (ctx.clone(), RelayError::Internal(e.to_string())))?;
    let validity_secs = (subscription.valid_until - subscription.valid_from).num_seconds().max(0) as u64;
    let floor_secs = state.subscriber_ttl_floor_hours * 3600;
    let ttl = std::time::Duration::from_secs(validity_secs.max(floor_secs));
    state
        .cache
        .set(&Subscription::cache_key(&subscription.subscriber_id), record, ttl)
        .await
        .map_err(|e| (ctx.clone(), e))?;

    Ok((StatusCode::OK, axum::Json(Envelope::ack(ctx))).into_response())
}

fn nack(ctx: Value, err: &RelayError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(Envelope::nack(ctx, err, None))).into_response()
}
