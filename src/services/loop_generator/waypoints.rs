use crate::config::LoopGeneratorConfig;
use crate::constants::METERS_PER_MILE;
use crate::models::{Coordinates, GenerationMethod, WaypointPattern};
use std::f64::consts::TAU;

/// Perimeter of an equilateral triangle matches the loop circumference at
/// side = 2π/3 × radius
const TRIANGLE_SIDE_FRACTION: f64 = 2.09;

/// Half the apex angle of an equilateral triangle
const TRIANGLE_HALF_ANGLE_DEG: f64 = 30.0;

/// Intermediate points on each four-point loop circle
const RING_WAYPOINTS: usize = 4;

/// (pattern, headings, radius fraction) of every configuration tried
const CONFIGURATIONS: &[(WaypointPattern, [f64; 4], f64)] = &[
    (WaypointPattern::Cardinal, [0.0, 90.0, 180.0, 270.0], 1.0),
    (WaypointPattern::Diagonal, [45.0, 135.0, 225.0, 315.0], 0.8),
    (WaypointPattern::Rotated, [22.5, 112.5, 202.5, 292.5], 0.65),
    (
        WaypointPattern::Triangle,
        [45.0, 135.0, 225.0, 315.0],
        TRIANGLE_SIDE_FRACTION,
    ),
];

/// One independent unit of fetch work
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointSet {
    pub waypoints: Vec<Coordinates>,
    pub method: GenerationMethod,
}

/// Radius (meters) of a circle whose road length takes `duration_minutes`
pub fn loop_radius_m(duration_minutes: f64, config: &LoopGeneratorConfig) -> f64 {
    let loop_miles = config.average_speed_mph * duration_minutes / 60.0;
    loop_miles / (TAU * config.road_factor) * METERS_PER_MILE
}

/// Every waypoint configuration for a loop from `start`
pub fn waypoint_sets(
    start: Coordinates,
    duration_minutes: f64,
    config: &LoopGeneratorConfig,
) -> Vec<WaypointSet> {
    let radius_m = loop_radius_m(duration_minutes, config);

    CONFIGURATIONS
        .iter()
        .flat_map(|&(pattern, headings, fraction)| {
            headings.into_iter().map(move |heading_deg| {
                let distance = radius_m * fraction;
                let waypoints = match pattern {
                    WaypointPattern::Triangle => triangle(start, heading_deg, distance),
                    _ => ring(start, heading_deg, distance),
                };
                WaypointSet {
                    waypoints,
                    method: GenerationMethod {
                        pattern,
                        heading_deg,
                        radius_fraction: fraction,
                    },
                }
            })
        })
        .collect()
}

/// Points evenly spaced on a circle through `start`, centred `radius_m`
/// away along `heading_deg`. The start is the fifth point of the ring.
fn ring(start: Coordinates, heading_deg: f64, radius_m: f64) -> Vec<Coordinates> {
    let center = start.offset(heading_deg, radius_m);
    let spacing = 360.0 / (RING_WAYPOINTS + 1) as f64;
    (1..=RING_WAYPOINTS)
        .map(|k| center.offset(heading_deg + 180.0 + k as f64 * spacing, radius_m))
        .collect()
}

/// The two far vertices of an equilateral triangle with the start as apex
fn triangle(start: Coordinates, heading_deg: f64, side_m: f64) -> Vec<Coordinates> {
    vec![
        start.offset(heading_deg - TRIANGLE_HALF_ANGLE_DEG, side_m),
        start.offset(heading_deg + TRIANGLE_HALF_ANGLE_DEG, side_m),
    ]
}
