use crate::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /debug/health - Report which routing backend is serving requests
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let failed_over = state.routing.failover_state().is_failed_over();

    Json(json!({
        "status": if failed_over { "degraded" } else { "ok" },
        "routing_backend": state.routing.active_backend_name(),
    }))
}
