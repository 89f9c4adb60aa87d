mod progress;
mod ranking;
mod waypoints;

pub use progress::{GenerationStage, Progress, ProgressReporter};
pub use ranking::{highlights, rank, shape_quality};
pub use waypoints::{loop_radius_m, waypoint_sets, WaypointSet};

use crate::config::{LoopGeneratorConfig, ScoringConfig};
use crate::error::{AppError, Result};
use crate::models::{Coordinates, FloorabilityResult, LoopCandidate, ScoredLoopRoute};
use crate::services::floorability;
use crate::services::geometry;
use crate::services::loop_geometry::LoopShape;
use crate::services::overpass::RoadAttributeSource;
use crate::services::routing::RouteProvider;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Searches for loop routes from a start point and ranks them by floorability.
///
/// Each call to [`generate_loops`](Self::generate_loops) is an isolated run;
/// the generator itself holds no mutable state.
pub struct LoopGenerator {
    routes: Arc<dyn RouteProvider>,
    attributes: Arc<dyn RoadAttributeSource>,
    scoring: ScoringConfig,
    config: LoopGeneratorConfig,
}

impl LoopGenerator {
    pub fn new(
        routes: Arc<dyn RouteProvider>,
        attributes: Arc<dyn RoadAttributeSource>,
        scoring: ScoringConfig,
        config: LoopGeneratorConfig,
    ) -> Self {
        LoopGenerator {
            routes,
            attributes,
            scoring,
            config,
        }
    }

    /// Run until done, or until `shutdown` resolves. A cancelled run returns
    /// [`AppError::Cancelled`] and drops every in-flight request.
    pub async fn generate_until<F>(
        &self,
        start: Coordinates,
        duration_minutes: f64,
        progress: &ProgressReporter,
        shutdown: F,
    ) -> Result<Vec<ScoredLoopRoute>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = shutdown => {
                progress.stage(GenerationStage::Failed("cancelled".to_string()), 0.0);
                Err(AppError::Cancelled)
            }
            result = self.generate_loops(start, duration_minutes, progress) => result,
        }
    }

    pub async fn generate_loops(
        &self,
        start: Coordinates,
        duration_minutes: f64,
        progress: &ProgressReporter,
    ) -> Result<Vec<ScoredLoopRoute>> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("loop_generation", run_id = %run_id);
        self.run(start, duration_minutes, progress)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        start: Coordinates,
        duration_minutes: f64,
        progress: &ProgressReporter,
    ) -> Result<Vec<ScoredLoopRoute>> {
        tracing::info!(
            lat = start.lat,
            lng = start.lng,
            duration_min = duration_minutes,
            "Generating loops from ({:.5}, {:.5}) for {} minutes",
            start.lat,
            start.lng,
            duration_minutes
        );

        progress.stage(GenerationStage::GeneratingWaypoints, 0.0);
        let sets = waypoint_sets(start, duration_minutes, &self.config);

        let candidates = self.fetch_candidates(start, &sets, progress).await;
        if candidates.is_empty() {
            let reason = "no route could be fetched for any waypoint set".to_string();
            tracing::warn!(
                waypoint_sets = sets.len(),
                "No loop candidates from {} waypoint sets",
                sets.len()
            );
            progress.stage(GenerationStage::Failed(reason.clone()), 1.0);
            return Err(AppError::NoCandidates(reason));
        }

        progress.stage(GenerationStage::EvaluatingShapes, 0.5);
        let shortlisted = self.shortlist(candidates, duration_minutes);

        let scored = self.score_candidates(shortlisted, progress).await;

        let ranked = rank(
            scored,
            self.scoring.min_score_threshold,
            self.config.max_results,
        );
        tracing::info!(
            routes = ranked.len(),
            top_score = ranked.first().map(|r| r.floorability.total_score).unwrap_or(0),
            "Returning {} ranked loops",
            ranked.len()
        );
        progress.stage(GenerationStage::Ranked, 1.0);
        Ok(ranked)
    }

    /// Fetch in parallel within a batch, batches one after another
    async fn fetch_candidates(
        &self,
        start: Coordinates,
        sets: &[WaypointSet],
        progress: &ProgressReporter,
    ) -> Vec<LoopCandidate> {
        let batch_size = self.config.batch_size.max(1);
        let batch_count = sets.len().div_ceil(batch_size).max(1);
        let mut candidates = Vec::with_capacity(sets.len());

        for (batch_idx, batch) in sets.chunks(batch_size).enumerate() {
            progress.report(
                GenerationStage::FetchingRoutes,
                format!("Fetching routes {}/{}", batch_idx + 1, batch_count),
                0.05 + 0.4 * batch_idx as f32 / batch_count as f32,
            );

            let fetches = batch.iter().map(|set| async move {
                self.routes
                    .fetch_trip(start, &set.waypoints)
                    .await
                    .map(|route| LoopCandidate {
                        route,
                        waypoints: set.waypoints.clone(),
                        method: set.method,
                    })
            });
            let fetched: Vec<_> = join_all(fetches).await.into_iter().flatten().collect();

            tracing::debug!(
                batch = batch_idx + 1,
                fetched = fetched.len(),
                requested = batch.len(),
                "Batch {}: {}/{} routes fetched",
                batch_idx + 1,
                fetched.len(),
                batch.len()
            );
            candidates.extend(fetched);
        }

        candidates
    }

    /// Duration window, shape pre-filter and quality sort. Never returns an
    /// empty list for a non-empty input.
    fn shortlist(
        &self,
        candidates: Vec<LoopCandidate>,
        target_minutes: f64,
    ) -> Vec<(LoopCandidate, LoopShape)> {
        let min_minutes = target_minutes * self.config.min_duration_ratio;
        let max_minutes = target_minutes * self.config.max_duration_ratio;

        let total = candidates.len();
        let (in_window, outside): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| {
            let minutes = c.route.duration_minutes();
            minutes >= min_minutes && minutes <= max_minutes
        });
        let pool = if in_window.is_empty() {
            tracing::warn!(
                candidates = total,
                "No loop within {:.0}-{:.0} min, keeping all {} candidates",
                min_minutes,
                max_minutes,
                total
            );
            outside
        } else {
            in_window
        };

        let weights = (
            self.config.quality_weight_circularity,
            self.config.quality_weight_overlap,
            self.config.quality_weight_duration,
        );
        let mut shaped: Vec<(LoopCandidate, LoopShape, f64)> = pool
            .into_iter()
            .map(|candidate| {
                let shape = LoopShape::of(&candidate.route.geometry);
                let quality = shape_quality(
                    &shape,
                    candidate.route.duration_minutes(),
                    target_minutes,
                    weights,
                );
                (candidate, shape, quality)
            })
            .collect();

        let acceptable = |shape: &LoopShape| {
            shape.overlap_penalty <= self.config.max_overlap_penalty
                && shape.circularity >= self.config.min_circularity
        };
        if shaped.iter().any(|(_, shape, _)| acceptable(shape)) {
            shaped.retain(|(_, shape, _)| acceptable(shape));
        } else {
            tracing::debug!("Every candidate fails the shape limits, keeping them all");
        }

        shaped.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        shaped.truncate(self.config.attribute_candidates);

        tracing::debug!(
            shortlisted = shaped.len(),
            "{} candidates proceed to attribute scoring",
            shaped.len()
        );

        shaped
            .into_iter()
            .map(|(candidate, shape, _)| (candidate, shape))
            .collect()
    }

    /// One attribute query at a time, with a pause between queries
    async fn score_candidates(
        &self,
        shortlisted: Vec<(LoopCandidate, LoopShape)>,
        progress: &ProgressReporter,
    ) -> Vec<ScoredLoopRoute> {
        let total = shortlisted.len();
        let mut scored = Vec::with_capacity(total);

        for (idx, (candidate, shape)) in shortlisted.into_iter().enumerate() {
            if idx > 0 && !self.config.attribute_delay.is_zero() {
                tokio::time::sleep(self.config.attribute_delay).await;
            }
            progress.report(
                GenerationStage::ScoringAttributes,
                format!("Scoring roads {}/{}", idx + 1, total),
                0.55 + 0.4 * idx as f32 / total.max(1) as f32,
            );

            let snapshot = self
                .attributes
                .query_attributes(&candidate.route.geometry)
                .await;

            // Without road data the candidate stays at zero, shape bonus included
            let result = if snapshot.degraded {
                FloorabilityResult::zero()
            } else {
                let legs = candidate
                    .route
                    .has_steps()
                    .then_some(candidate.route.legs.as_slice());
                floorability::score(&candidate.route.geometry, legs, &snapshot, &self.scoring)
                    .with_shape_adjustments(
                        shape.circularity,
                        shape.overlap_penalty,
                        &self.config.shape_adjustment,
                    )
            };

            // How far the router pulled the loop off its planned heading
            let drift = geometry::reach_bearing(&candidate.route.geometry)
                .map(|reach| geometry::bearing_delta(reach, candidate.method.heading_deg))
                .unwrap_or(0.0);
            tracing::debug!(
                pattern = %candidate.method.pattern,
                heading = candidate.method.heading_deg,
                drift_deg = %format!("{:.0}", drift),
                score = result.total_score,
                circularity = %format!("{:.2}", shape.circularity),
                overlap = %format!("{:.2}", shape.overlap_penalty),
                "Candidate {} scored {}",
                idx + 1,
                result.total_score
            );

            let highlights = highlights(
                &result,
                &shape,
                &self.config.shape_adjustment,
                snapshot.degraded,
            );
            scored.push(ScoredLoopRoute {
                id: String::new(),
                color: String::new(),
                distance_miles: candidate.route.distance_miles(),
                duration_minutes: candidate.route.duration_minutes(),
                route: candidate.route,
                waypoints: candidate.waypoints,
                method: candidate.method,
                floorability: result,
                circularity: shape.circularity,
                overlap_penalty: shape.overlap_penalty,
                delta_minutes: 0.0,
                is_fastest: false,
                highlights,
            });
        }

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEGRADED_DATA_NOTE, LIMITED_OPPORTUNITY_MARKER, METERS_PER_MILE};
    use crate::models::{AttributeSnapshot, ElementKind, NormalizedRoute, RoadElement};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const MPH_30_IN_MPS: f64 = 30.0 * METERS_PER_MILE / 3600.0;

    /// Straight-line "roads" between the waypoints, driven at 30 mph
    struct StraightLineRouter {
        calls: AtomicUsize,
    }

    impl StraightLineRouter {
        fn new() -> Self {
            StraightLineRouter {
                calls: AtomicUsize::new(0),
            }
        }
    }

    fn densify(points: &[Coordinates], per_segment: usize) -> Vec<Coordinates> {
        let mut path = Vec::new();
        for pair in points.windows(2) {
            for k in 0..per_segment {
                let t = k as f64 / per_segment as f64;
                path.push(
                    Coordinates::new(
                        pair[0].lat + (pair[1].lat - pair[0].lat) * t,
                        pair[0].lng + (pair[1].lng - pair[0].lng) * t,
                    )
                    .unwrap(),
                );
            }
        }
        if let Some(last) = points.last() {
            path.push(*last);
        }
        path
    }

    #[async_trait]
    impl RouteProvider for StraightLineRouter {
        async fn fetch_route(
            &self,
            start: Coordinates,
            waypoints: &[Coordinates],
        ) -> Option<NormalizedRoute> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut stops = vec![start];
            stops.extend_from_slice(waypoints);
            let geometry = densify(&stops, 30);
            let distance_m = geometry::path_length_m(&geometry);
            Some(NormalizedRoute {
                distance_m,
                duration_s: distance_m / MPH_30_IN_MPS,
                geometry,
                legs: Vec::new(),
            })
        }

        async fn fetch_trip(
            &self,
            start: Coordinates,
            waypoints: &[Coordinates],
        ) -> Option<NormalizedRoute> {
            let mut closed = waypoints.to_vec();
            closed.push(start);
            self.fetch_route(start, &closed).await
        }
    }

    struct DeadRouter;

    #[async_trait]
    impl RouteProvider for DeadRouter {
        async fn fetch_route(&self, _: Coordinates, _: &[Coordinates]) -> Option<NormalizedRoute> {
            None
        }

        async fn fetch_trip(&self, _: Coordinates, _: &[Coordinates]) -> Option<NormalizedRoute> {
            None
        }
    }

    /// Posts 25 mph early on the route and 55 mph from the middle
    struct SpeedStepAttributes;

    #[async_trait]
    impl RoadAttributeSource for SpeedStepAttributes {
        async fn query_attributes(&self, geometry: &[Coordinates]) -> AttributeSnapshot {
            let way = |id: i64, at: Coordinates, speed: &str| RoadElement {
                id,
                kind: ElementKind::Way {
                    geometry: vec![at],
                },
                tags: [
                    ("maxspeed".to_string(), speed.to_string()),
                    ("highway".to_string(), "primary".to_string()),
                ]
                .into_iter()
                .collect::<HashMap<_, _>>(),
            };
            AttributeSnapshot::new(vec![
                way(1, geometry[geometry.len() / 10], "25 mph"),
                way(2, geometry[geometry.len() / 2], "55 mph"),
            ])
        }
    }

    struct OfflineAttributes;

    #[async_trait]
    impl RoadAttributeSource for OfflineAttributes {
        async fn query_attributes(&self, _: &[Coordinates]) -> AttributeSnapshot {
            AttributeSnapshot::degraded()
        }
    }

    fn test_config() -> LoopGeneratorConfig {
        LoopGeneratorConfig {
            attribute_delay: Duration::ZERO,
            ..LoopGeneratorConfig::default()
        }
    }

    fn generator(
        routes: Arc<dyn RouteProvider>,
        attributes: Arc<dyn RoadAttributeSource>,
    ) -> LoopGenerator {
        LoopGenerator::new(routes, attributes, ScoringConfig::default(), test_config())
    }

    fn start() -> Coordinates {
        Coordinates::new(41.03, -73.76).unwrap()
    }

    #[tokio::test]
    async fn test_generates_ranked_loops() {
        let router = Arc::new(StraightLineRouter::new());
        let generator = generator(router.clone(), Arc::new(SpeedStepAttributes));

        let routes = generator
            .generate_loops(start(), 30.0, &ProgressReporter::disabled())
            .await
            .unwrap();

        assert_eq!(router.calls.load(Ordering::SeqCst), 16);
        assert!(!routes.is_empty() && routes.len() <= 5);
        assert_eq!(routes.iter().filter(|r| r.is_fastest).count(), 1);
        assert!(routes.iter().all(|r| r.delta_minutes >= 0.0));
        assert!(routes
            .windows(2)
            .all(|w| w[0].floorability.total_score >= w[1].floorability.total_score));
        assert!(routes.iter().all(|r| r.floorability.total_score >= 25));
        assert_eq!(routes[0].id, "loop-1");

        let fastest = routes.iter().find(|r| r.is_fastest).unwrap();
        let min_minutes = routes
            .iter()
            .map(|r| r.duration_minutes)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(fastest.duration_minutes, min_minutes);
        assert_eq!(fastest.delta_minutes, 0.0);
    }

    #[tokio::test]
    async fn test_degraded_attributes_mark_limited_opportunity() {
        let generator = generator(
            Arc::new(StraightLineRouter::new()),
            Arc::new(OfflineAttributes),
        );

        let routes = generator
            .generate_loops(start(), 30.0, &ProgressReporter::disabled())
            .await
            .unwrap();

        assert!(!routes.is_empty());
        for route in &routes {
            let markers = route
                .highlights
                .iter()
                .filter(|h| h.as_str() == LIMITED_OPPORTUNITY_MARKER)
                .count();
            assert_eq!(markers, 1);
            assert!(route.highlights.iter().any(|h| h == DEGRADED_DATA_NOTE));
            assert!(route.floorability.events.is_empty());
            // Round loops would otherwise earn the circularity bonus
            assert_eq!(route.floorability.total_score, 0);
            assert_eq!(route.floorability, FloorabilityResult::zero());
        }
    }

    #[tokio::test]
    async fn test_no_routes_is_fatal() {
        let generator = generator(Arc::new(DeadRouter), Arc::new(SpeedStepAttributes));
        let (reporter, mut rx) = ProgressReporter::channel();

        let result = generator.generate_loops(start(), 30.0, &reporter).await;
        assert!(matches!(result, Err(AppError::NoCandidates(_))));

        let last = std::iter::from_fn(|| rx.try_recv().ok()).last().unwrap();
        assert!(matches!(last.stage, GenerationStage::Failed(_)));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_ranked() {
        let generator = generator(
            Arc::new(StraightLineRouter::new()),
            Arc::new(SpeedStepAttributes),
        );
        let (reporter, mut rx) = ProgressReporter::channel();

        generator
            .generate_loops(start(), 45.0, &reporter)
            .await
            .unwrap();

        let updates: Vec<Progress> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(updates.len() > 4);
        assert!(updates.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        let last = updates.last().unwrap();
        assert_eq!(last.stage, GenerationStage::Ranked);
        assert_eq!(last.fraction, 1.0);
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_no_routes() {
        let generator = generator(
            Arc::new(StraightLineRouter::new()),
            Arc::new(SpeedStepAttributes),
        );

        let result = generator
            .generate_until(
                start(),
                30.0,
                &ProgressReporter::disabled(),
                std::future::ready(()),
            )
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_shortlist_keeps_everything_when_all_out_of_window() {
        let generator = generator(
            Arc::new(StraightLineRouter::new()),
            Arc::new(SpeedStepAttributes),
        );
        // A 30 minute loop against a 240 minute target is outside [96, 528]
        let sets = waypoint_sets(start(), 30.0, &generator.config);
        let candidates = generator
            .fetch_candidates(start(), &sets, &ProgressReporter::disabled())
            .await;
        let shortlisted = generator.shortlist(candidates, 240.0);
        assert_eq!(shortlisted.len(), generator.config.attribute_candidates);
    }
}
