use crate::error::{AppError, Result};
use crate::models::loop_route::{LoopRouteRequest, LoopRouteResponse};
use crate::services::loop_generator::ProgressReporter;
use crate::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// POST /routes/loop
/// Generate loops that start and end at the same point, ranked by floorability
pub async fn create_loop_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoopRouteRequest>,
) -> Result<Json<LoopRouteResponse>> {
    request.validate().map_err(AppError::InvalidRequest)?;

    tracing::info!(
        lat = request.start.lat,
        lng = request.start.lng,
        duration_min = request.duration_minutes,
        "Loop route request: ({:.4}, {:.4}), {:.0} minutes",
        request.start.lat,
        request.start.lng,
        request.duration_minutes
    );

    let routes = state
        .loop_generator
        .generate_loops(
            request.start,
            request.duration_minutes,
            &ProgressReporter::disabled(),
        )
        .await?;

    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::Internal(format!("Failed to format timestamp: {}", e)))?;

    Ok(Json(LoopRouteResponse {
        routes,
        generated_at,
    }))
}
