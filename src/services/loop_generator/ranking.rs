use crate::constants::{DEGRADED_DATA_NOTE, LIMITED_OPPORTUNITY_MARKER, ROUTE_COLORS};
use crate::models::{EventKind, FloorabilityResult, ScoredLoopRoute, ShapeAdjustment};
use crate::services::loop_geometry::LoopShape;

/// Shape quality of a fetched candidate, no network involved
pub fn shape_quality(
    shape: &LoopShape,
    duration_minutes: f64,
    target_minutes: f64,
    weights: (f64, f64, f64),
) -> f64 {
    let (w_circularity, w_overlap, w_duration) = weights;
    let duration_fit = if target_minutes > 0.0 {
        (1.0 - (duration_minutes - target_minutes).abs() / target_minutes).max(0.0)
    } else {
        0.0
    };
    shape.circularity * w_circularity
        + (1.0 - shape.overlap_penalty) * w_overlap
        + duration_fit * w_duration
}

fn count_phrase(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Short bullet points for one scored loop
pub fn highlights(
    floorability: &FloorabilityResult,
    shape: &LoopShape,
    rules: &ShapeAdjustment,
    degraded: bool,
) -> Vec<String> {
    let mut out = Vec::new();

    if degraded {
        out.push(DEGRADED_DATA_NOTE.to_string());
    }

    if let Some(best) = floorability.events.first() {
        out.push(best.detail.clone());
    }

    let count = |kind: EventKind| floorability.events.iter().filter(|e| e.kind == kind).count();
    let categories = [
        (EventKind::SpeedDelta, "speed step-up", "speed step-ups"),
        (EventKind::SignalLaunch, "signal launch", "signal launches"),
        (EventKind::RampMerge, "ramp merge", "ramp merges"),
    ];
    for (kind, singular, plural) in categories {
        let n = count(kind);
        if n > 0 {
            out.push(count_phrase(n, singular, plural));
        }
    }

    if shape.circularity > rules.circularity_threshold {
        out.push("Clean loop, little backtracking".to_string());
    } else if shape.overlap_penalty > rules.overlap_threshold {
        out.push("Some stretches are driven twice".to_string());
    }

    out
}

/// Final ordering of scored loops.
///
/// Sorts by score, drops loops below `min_score` unless none clears it (then
/// every loop is marked as limited), keeps `max_results`, and only then
/// computes the fastest loop and rank-based ids/colours.
pub fn rank(
    mut scored: Vec<ScoredLoopRoute>,
    min_score: u32,
    max_results: usize,
) -> Vec<ScoredLoopRoute> {
    scored.sort_by(|a, b| b.floorability.total_score.cmp(&a.floorability.total_score));

    if scored
        .iter()
        .any(|r| r.floorability.total_score >= min_score)
    {
        scored.retain(|r| r.floorability.total_score >= min_score);
    } else {
        for route in &mut scored {
            route.highlights.retain(|h| h != LIMITED_OPPORTUNITY_MARKER);
            route
                .highlights
                .insert(0, LIMITED_OPPORTUNITY_MARKER.to_string());
        }
    }

    scored.truncate(max_results);

    let fastest = scored
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.duration_minutes
                .partial_cmp(&b.duration_minutes)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(idx, route)| (idx, route.duration_minutes));

    for (rank, route) in scored.iter_mut().enumerate() {
        route.id = format!("loop-{}", rank + 1);
        route.color = ROUTE_COLORS[rank % ROUTE_COLORS.len()].to_string();
        if let Some((fastest_idx, fastest_minutes)) = fastest {
            route.delta_minutes = (route.duration_minutes - fastest_minutes).max(0.0);
            route.is_fastest = rank == fastest_idx;
        }
    }

    scored
}
