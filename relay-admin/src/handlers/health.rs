use axum::response::Json;
use serde_json::{json, Value};

/// `GET /healthz` — liveness probe, 200 once bring-up has completed.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
