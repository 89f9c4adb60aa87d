use crate::constants::METERS_PER_MILE;
use crate::models::Coordinates;
use serde::{Deserialize, Serialize};

/// One maneuver-delimited stretch of a leg
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouteStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_ref: Option<String>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub maneuver: String,
}

/// Waypoint-to-waypoint segment of a route
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouteLeg {
    pub distance_m: f64,
    pub duration_s: f64,
    pub steps: Vec<RouteStep>,
}

impl RouteLeg {
    pub fn step_distance_m(&self) -> f64 {
        self.steps.iter().map(|s| s.distance_m).sum()
    }
}

/// Canonical route produced once by the routing client and read-only afterwards
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRoute {
    pub distance_m: f64,
    pub duration_s: f64,
    pub geometry: Vec<Coordinates>,
    pub legs: Vec<RouteLeg>,
}

impl NormalizedRoute {
    pub fn distance_miles(&self) -> f64 {
        self.distance_m / METERS_PER_MILE
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_s / 60.0
    }

    pub fn has_steps(&self) -> bool {
        self.legs.iter().any(|leg| !leg.steps.is_empty())
    }

    pub fn steps(&self) -> impl Iterator<Item = &RouteStep> {
        self.legs.iter().flat_map(|leg| leg.steps.iter())
    }
}
