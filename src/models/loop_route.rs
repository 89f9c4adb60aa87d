use crate::constants::MAX_ROUTE_COORDINATES;
use crate::models::{Coordinates, FloorabilityResult, NormalizedRoute};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the waypoint set a candidate was generated from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaypointPattern {
    Cardinal,
    Diagonal,
    Rotated,
    Triangle,
}

impl fmt::Display for WaypointPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaypointPattern::Cardinal => write!(f, "cardinal"),
            WaypointPattern::Diagonal => write!(f, "diagonal"),
            WaypointPattern::Rotated => write!(f, "rotated"),
            WaypointPattern::Triangle => write!(f, "triangle"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationMethod {
    pub pattern: WaypointPattern,
    /// Direction from the start towards the far side of the loop
    pub heading_deg: f64,
    /// Multiple of the duration-derived loop radius
    pub radius_fraction: f64,
}

/// A fetched loop waiting to be evaluated. Dropped after ranking.
#[derive(Debug, Clone)]
pub struct LoopCandidate {
    pub route: NormalizedRoute,
    pub waypoints: Vec<Coordinates>,
    pub method: GenerationMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredLoopRoute {
    /// Rank-based, reassigned after the final sort
    pub id: String,
    pub color: String,
    pub route: NormalizedRoute,
    pub waypoints: Vec<Coordinates>,
    pub method: GenerationMethod,
    pub floorability: FloorabilityResult,
    pub circularity: f64,
    pub overlap_penalty: f64,
    pub distance_miles: f64,
    pub duration_minutes: f64,
    /// Minutes longer than the quickest returned loop
    pub delta_minutes: f64,
    pub is_fastest: bool,
    pub highlights: Vec<String>,
}

/// A single scored route (no loop adjustments)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredRoute {
    pub route: NormalizedRoute,
    pub floorability: FloorabilityResult,
    pub distance_miles: f64,
    pub duration_minutes: f64,
}

// Request/Response types for API endpoints

#[derive(Debug, Deserialize)]
pub struct LoopRouteRequest {
    pub start: Coordinates,
    pub duration_minutes: f64,
}

impl LoopRouteRequest {
    pub fn validate(&self) -> Result<(), String> {
        Coordinates::new(self.start.lat, self.start.lng)?;
        if !(10.0..=240.0).contains(&self.duration_minutes) {
            return Err("duration_minutes must be between 10 and 240".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoopRouteResponse {
    pub routes: Vec<ScoredLoopRoute>,
    pub generated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRouteRequest {
    pub waypoints: Vec<Coordinates>,
}

impl ScoreRouteRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.waypoints.len() < 2 {
            return Err("At least 2 waypoints required".to_string());
        }
        if self.waypoints.len() > MAX_ROUTE_COORDINATES {
            return Err(format!(
                "Maximum {} waypoints allowed",
                MAX_ROUTE_COORDINATES
            ));
        }
        for waypoint in &self.waypoints {
            Coordinates::new(waypoint.lat, waypoint.lng)?;
        }
        Ok(())
    }
}
