use crate::error::{AppError, Result};
use crate::models::loop_route::ScoreRouteRequest;
use crate::models::ScoredRoute;
use crate::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// POST /routes/score
/// Score the route through the given waypoints as-is
pub async fn score_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScoreRouteRequest>,
) -> Result<Json<ScoredRoute>> {
    request.validate().map_err(AppError::InvalidRequest)?;

    tracing::info!(
        waypoints = request.waypoints.len(),
        "Score route request with {} waypoints",
        request.waypoints.len()
    );

    let scored = state.route_scorer.score_waypoints(&request.waypoints).await?;
    Ok(Json(scored))
}
