use crate::config::ScoringConfig;
use crate::error::{AppError, Result};
use crate::models::{Coordinates, FloorabilityResult, ScoredRoute};
use crate::services::floorability;
use crate::services::overpass::RoadAttributeSource;
use crate::services::routing::RouteProvider;
use std::sync::Arc;

/// Scores a single route through the given waypoints, without loop shaping
pub struct RouteScorer {
    routes: Arc<dyn RouteProvider>,
    attributes: Arc<dyn RoadAttributeSource>,
    scoring: ScoringConfig,
}

impl RouteScorer {
    pub fn new(
        routes: Arc<dyn RouteProvider>,
        attributes: Arc<dyn RoadAttributeSource>,
        scoring: ScoringConfig,
    ) -> Self {
        RouteScorer {
            routes,
            attributes,
            scoring,
        }
    }

    /// Fetch the route `waypoints[0] → ... → waypoints[n-1]` and score it
    pub async fn score_waypoints(&self, waypoints: &[Coordinates]) -> Result<ScoredRoute> {
        let (start, rest) = waypoints.split_first().ok_or_else(|| {
            AppError::InvalidRequest("At least 2 waypoints required".to_string())
        })?;
        if rest.is_empty() {
            return Err(AppError::InvalidRequest(
                "At least 2 waypoints required".to_string(),
            ));
        }

        let route = self
            .routes
            .fetch_route(*start, rest)
            .await
            .ok_or_else(|| AppError::Routing("No route between the waypoints".to_string()))?;

        let snapshot = self.attributes.query_attributes(&route.geometry).await;
        let floorability = if snapshot.degraded {
            tracing::warn!("Scoring route without road data");
            FloorabilityResult::zero()
        } else {
            let legs = route.has_steps().then_some(route.legs.as_slice());
            floorability::score(&route.geometry, legs, &snapshot, &self.scoring)
        };

        tracing::info!(
            distance_mi = %format!("{:.1}", route.distance_miles()),
            score = floorability.total_score,
            events = floorability.event_count,
            "Scored route: {:.1}mi, score {}",
            route.distance_miles(),
            floorability.total_score
        );

        Ok(ScoredRoute {
            distance_miles: route.distance_miles(),
            duration_minutes: route.duration_minutes(),
            route,
            floorability,
        })
    }
}
