//! Floorability scoring engine.
//!
//! Pure: a route, its optional maneuver legs and one attribute snapshot go
//! in, a [`FloorabilityResult`] comes out. Nothing is retained between calls.

use crate::config::ScoringConfig;
use crate::constants::{FEET_PER_MILE, METERS_PER_MILE};
use crate::models::floorability::NO_EVENTS_MOMENT;
use crate::models::{
    AttributeSnapshot, Coordinates, EventFacts, FloorItEvent, FloorabilityResult, RawScores,
    RouteLeg, SpeedProfileEntry,
};
use crate::services::geometry;
use crate::services::matcher::Matcher;
use std::collections::HashSet;

/// Signals farther than this from the route are on other roads
const SIGNAL_MAX_DISTANCE_FT: f64 = 250.0;
/// Signals closer than this along the route are one intersection
const SIGNAL_DEDUP_MILES: f64 = 0.05;
const SIGNAL_MIN_SPEED_MPH: f64 = 35.0;
/// Assumed speed when no profile entry is near a signal
const SIGNAL_DEFAULT_SPEED_MPH: f64 = 35.0;
const SIGNAL_SPEED_SEARCH_INDICES: usize = 30;
const SIGNAL_GAP_CAP_MILES: f64 = 2.0;
const SIGNAL_REFERENCE_SPEED_MPH: f64 = 50.0;
const SIGNAL_POINTS: f64 = 15.0;

const RAMP_MAX_DISTANCE_MILES: f64 = 0.15;
const RAMP_LENGTH_CAP_MILES: f64 = 0.5;
const RAMP_POINTS_PER_MILE: f64 = 60.0;

/// Route coordinates with running distance, shared by the detectors
pub struct RouteTrack<'a> {
    coords: &'a [Coordinates],
    along_miles: Vec<f64>,
}

impl<'a> RouteTrack<'a> {
    pub fn new(coords: &'a [Coordinates]) -> Self {
        let along_miles = geometry::cumulative_distances_m(coords)
            .into_iter()
            .map(|m| m / METERS_PER_MILE)
            .collect();
        RouteTrack {
            coords,
            along_miles,
        }
    }

    fn along(&self, index: usize) -> f64 {
        self.along_miles
            .get(index)
            .or(self.along_miles.last())
            .copied()
            .unwrap_or(0.0)
    }

    fn total_miles(&self) -> f64 {
        self.along_miles.last().copied().unwrap_or(0.0)
    }

    fn coordinate(&self, index: usize) -> Option<Coordinates> {
        self.coords.get(index).or(self.coords.last()).copied()
    }
}

/// Score one route against one attribute snapshot
pub fn score(
    coords: &[Coordinates],
    legs: Option<&[RouteLeg]>,
    snapshot: &AttributeSnapshot,
    config: &ScoringConfig,
) -> FloorabilityResult {
    if coords.len() < 2 || snapshot.is_empty() {
        return FloorabilityResult::zero();
    }

    let matcher = Matcher::new(coords, legs);
    let track = RouteTrack::new(coords);
    let profile = matcher.build_speed_profile(snapshot);

    let speed = detect_speed_deltas(&track, &profile, config);
    let signals = detect_signal_launches(&track, &profile, snapshot);
    let ramps = detect_ramp_merges(&matcher, &track, snapshot);
    let road_quality = road_quality_points(&matcher, snapshot);

    let raw = RawScores {
        speed_delta: speed.raw,
        signal_launch: signals.raw,
        ramp_merge: ramps.raw,
        runway: config.runway_points_per_mile * speed.runway_miles,
        road_quality,
    };

    let mut events = speed.events;
    events.extend(signals.events);
    events.extend(ramps.events);
    events.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    tracing::trace!(
        profile_entries = profile.len(),
        events = events.len(),
        "Scored route: {} profile entries, {} events",
        profile.len(),
        events.len()
    );

    let mut result = compose(raw, config);
    if let Some(best) = events.first() {
        result.best_moment = best.detail.clone();
    }
    result.event_count = events.len();
    result.events = events;
    result
}

fn normalized(raw: f64, denominator: f64) -> u32 {
    (raw / denominator * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Weighted composite and independently normalised sub-scores.
/// Non-decreasing in every raw total.
pub fn compose(raw: RawScores, config: &ScoringConfig) -> FloorabilityResult {
    let raw_total = raw.speed_delta * config.weight_speed_delta
        + raw.signal_launch * config.weight_signal_launch
        + raw.ramp_merge * config.weight_ramp_merge
        + raw.runway * config.weight_runway
        + raw.road_quality * config.weight_road_quality;

    FloorabilityResult {
        total_score: normalized(raw_total, config.total_normalizer),
        raw_score: raw_total,
        events: Vec::new(),
        speed_delta_score: normalized(raw.speed_delta, config.speed_delta_normalizer),
        signal_launch_score: normalized(raw.signal_launch, config.signal_launch_normalizer),
        ramp_merge_score: normalized(raw.ramp_merge, config.ramp_merge_normalizer),
        runway_score: normalized(raw.runway, config.runway_normalizer),
        road_quality_score: normalized(raw.road_quality, config.road_quality_normalizer),
        best_moment: NO_EVENTS_MOMENT.to_string(),
        event_count: 0,
    }
}

/// Events of one category with their summed raw score
#[derive(Debug, Default)]
pub struct Detection {
    pub events: Vec<FloorItEvent>,
    pub raw: f64,
    /// Capped runway miles, speed deltas only
    pub runway_miles: f64,
}

fn speed_factor(speed_mph: f64) -> f64 {
    if speed_mph >= 50.0 {
        1.5
    } else if speed_mph >= 40.0 {
        1.2
    } else {
        1.0
    }
}

/// Step-ups between adjacent profile entries
pub fn detect_speed_deltas(
    track: &RouteTrack<'_>,
    profile: &[SpeedProfileEntry],
    config: &ScoringConfig,
) -> Detection {
    let mut detection = Detection::default();

    for (pos, pair) in profile.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        let delta = cur.speed_mph - prev.speed_mph;
        if delta < config.speed_delta_min_mph {
            continue;
        }

        let runway_end = profile[pos + 2..]
            .iter()
            .find(|e| e.speed_mph != cur.speed_mph)
            .map(|e| track.along(e.index))
            .unwrap_or_else(|| track.total_miles());
        let runway = (runway_end - track.along(cur.index)).max(0.0);
        let capped = runway.min(config.runway_cap_miles);

        let points = delta * capped * speed_factor(cur.speed_mph);
        detection.raw += points;
        detection.runway_miles += capped;

        if let Some(coordinate) = track.coordinate(cur.index) {
            detection.events.push(FloorItEvent::new(
                EventFacts::SpeedDelta {
                    from_mph: prev.speed_mph,
                    to_mph: cur.speed_mph,
                    road: &cur.road_name,
                },
                coordinate,
                points,
                runway,
            ));
        }
    }

    detection
}

fn nearest_profile_entry(profile: &[SpeedProfileEntry], index: usize) -> Option<&SpeedProfileEntry> {
    profile
        .iter()
        .filter(|e| e.index.abs_diff(index) <= SIGNAL_SPEED_SEARCH_INDICES)
        .min_by_key(|e| e.index.abs_diff(index))
}

/// Launches from traffic lights onto roads of at least 35 mph
pub fn detect_signal_launches(
    track: &RouteTrack<'_>,
    profile: &[SpeedProfileEntry],
    snapshot: &AttributeSnapshot,
) -> Detection {
    let max_distance_m = SIGNAL_MAX_DISTANCE_FT / FEET_PER_MILE * METERS_PER_MILE;

    let mut on_route: Vec<(usize, f64)> = snapshot
        .signals()
        .filter_map(|node| geometry::nearest_to_any(track.coords, node.points()))
        .filter(|(_, meters)| *meters <= max_distance_m)
        .map(|(index, _)| (index, track.along(index)))
        .collect();
    on_route.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut intersections: Vec<(usize, f64)> = Vec::with_capacity(on_route.len());
    for signal in on_route {
        match intersections.last() {
            Some(last) if signal.1 - last.1 < SIGNAL_DEDUP_MILES => {}
            _ => intersections.push(signal),
        }
    }

    let mut detection = Detection::default();
    for (pos, &(index, along)) in intersections.iter().enumerate() {
        let entry = nearest_profile_entry(profile, index);
        let speed = entry.map_or(SIGNAL_DEFAULT_SPEED_MPH, |e| e.speed_mph);
        if speed < SIGNAL_MIN_SPEED_MPH {
            continue;
        }
        let road = entry.map_or("", |e| e.road_name.as_str());

        // Gap to the next light on the route, qualifying or not
        let gap = intersections
            .get(pos + 1)
            .map(|next| (next.1 - along).min(SIGNAL_GAP_CAP_MILES))
            .unwrap_or(SIGNAL_GAP_CAP_MILES);
        let points = speed / SIGNAL_REFERENCE_SPEED_MPH * gap * SIGNAL_POINTS;
        detection.raw += points;

        if let Some(coordinate) = track.coordinate(index) {
            detection.events.push(FloorItEvent::new(
                EventFacts::SignalLaunch {
                    speed_mph: speed,
                    gap_miles: gap,
                    road,
                },
                coordinate,
                points,
                gap,
            ));
        }
    }

    detection
}

/// Motorway on-ramps close to the route, one per way id
pub fn detect_ramp_merges(
    matcher: &Matcher<'_>,
    track: &RouteTrack<'_>,
    snapshot: &AttributeSnapshot,
) -> Detection {
    let mut seen = HashSet::new();
    let mut detection = Detection::default();

    for ramp in snapshot.ramps() {
        if !seen.insert(ramp.id) {
            continue;
        }
        let Some((index, distance_miles)) = matcher.locate(ramp) else {
            continue;
        };
        if distance_miles > RAMP_MAX_DISTANCE_MILES {
            continue;
        }

        let ramp_miles = geometry::path_length_miles(ramp.points());
        let points = ramp_miles.min(RAMP_LENGTH_CAP_MILES) * RAMP_POINTS_PER_MILE;
        detection.raw += points;

        if let Some(coordinate) = track.coordinate(index) {
            detection.events.push(FloorItEvent::new(
                EventFacts::RampMerge { ramp_miles },
                coordinate,
                points,
                ramp_miles,
            ));
        }
    }

    detection
}

/// Lane and surface points over matched ways, each way counted once
pub fn road_quality_points(matcher: &Matcher<'_>, snapshot: &AttributeSnapshot) -> f64 {
    let mut seen = HashSet::new();
    snapshot
        .quality_ways()
        .filter(|way| seen.insert(way.id))
        .filter(|way| matcher.match_element(way).is_some())
        .map(|way| {
            let lanes = match way.lanes() {
                Some(l) if l >= 4 => 3.0,
                Some(l) if l >= 2 => 1.0,
                _ => 0.0,
            };
            let surface = match way.tag("surface") {
                Some("asphalt") => 2.0,
                Some("concrete") => 1.0,
                _ => 0.0,
            };
            lanes + surface
        })
        .sum()
}
