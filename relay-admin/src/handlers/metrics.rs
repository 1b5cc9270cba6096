use std::sync::Arc;

use axum::extract::State;

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics_handler(State(state): State<Arc<crate::state::AdminState>>) -> String {
    state.metrics.gather_text()
}
