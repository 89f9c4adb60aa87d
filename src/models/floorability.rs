use crate::models::Coordinates;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown as the best moment when a route has no events
pub const NO_EVENTS_MOMENT: &str = "No standout floor-it moments on this route";

/// Category of a floor-it event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SpeedDelta,
    SignalLaunch,
    RampMerge,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::SpeedDelta => write!(f, "speed_delta"),
            EventKind::SignalLaunch => write!(f, "signal_launch"),
            EventKind::RampMerge => write!(f, "ramp_merge"),
        }
    }
}

/// What was detected, with the facts each kind needs for its label
#[derive(Debug, Clone, PartialEq)]
pub enum EventFacts<'a> {
    SpeedDelta {
        from_mph: f64,
        to_mph: f64,
        road: &'a str,
    },
    SignalLaunch {
        speed_mph: f64,
        gap_miles: f64,
        road: &'a str,
    },
    RampMerge {
        ramp_miles: f64,
    },
}

impl EventFacts<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            EventFacts::SpeedDelta { .. } => EventKind::SpeedDelta,
            EventFacts::SignalLaunch { .. } => EventKind::SignalLaunch,
            EventFacts::RampMerge { .. } => EventKind::RampMerge,
        }
    }

    pub fn label(&self) -> String {
        match self {
            EventFacts::SpeedDelta {
                from_mph, to_mph, ..
            } => format!("{:.0}→{:.0} mph", from_mph, to_mph),
            EventFacts::SignalLaunch { speed_mph, .. } => {
                format!("Signal launch · {:.0} mph", speed_mph)
            }
            EventFacts::RampMerge { .. } => "Ramp merge".to_string(),
        }
    }

    pub fn detail(&self, runway_miles: f64) -> String {
        match self {
            EventFacts::SpeedDelta {
                from_mph,
                to_mph,
                road,
            } => format!(
                "Limit jumps {:.0}→{:.0} mph{} with {:.1} mi of runway",
                from_mph,
                to_mph,
                on_road(road),
                runway_miles
            ),
            EventFacts::SignalLaunch {
                speed_mph,
                gap_miles,
                road,
            } => format!(
                "Launch from a light into {:.0} mph{}, {:.1} mi to the next signal",
                speed_mph,
                on_road(road),
                gap_miles
            ),
            EventFacts::RampMerge { ramp_miles } => format!(
                "Highway on-ramp: {:.2} mi to get up to speed",
                ramp_miles
            ),
        }
    }
}

fn on_road(road: &str) -> String {
    if road.is_empty() {
        String::new()
    } else {
        format!(" on {}", road)
    }
}

/// One scorable opportunity on a route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloorItEvent {
    pub kind: EventKind,
    pub coordinate: Coordinates,
    pub score: f64,
    pub label: String,
    pub detail: String,
    pub runway_miles: f64,
}

impl FloorItEvent {
    pub fn new(
        facts: EventFacts<'_>,
        coordinate: Coordinates,
        score: f64,
        runway_miles: f64,
    ) -> Self {
        FloorItEvent {
            kind: facts.kind(),
            coordinate,
            score,
            label: facts.label(),
            detail: facts.detail(runway_miles),
            runway_miles,
        }
    }
}

/// Route position → posted speed, derived from matched ways
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeedProfileEntry {
    pub index: usize,
    pub speed_mph: f64,
    pub road_name: String,
    pub highway: String,
}

/// Uncombined category totals, before weighting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RawScores {
    pub speed_delta: f64,
    pub signal_launch: f64,
    pub ramp_merge: f64,
    pub runway: f64,
    pub road_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloorabilityResult {
    /// Composite 0-100
    pub total_score: u32,
    /// Weighted total before normalisation
    pub raw_score: f64,
    pub events: Vec<FloorItEvent>,
    pub speed_delta_score: u32,
    pub signal_launch_score: u32,
    pub ramp_merge_score: u32,
    pub runway_score: u32,
    pub road_quality_score: u32,
    pub best_moment: String,
    pub event_count: usize,
}

impl FloorabilityResult {
    pub fn zero() -> Self {
        FloorabilityResult {
            total_score: 0,
            raw_score: 0.0,
            events: Vec::new(),
            speed_delta_score: 0,
            signal_launch_score: 0,
            ramp_merge_score: 0,
            runway_score: 0,
            road_quality_score: 0,
            best_moment: NO_EVENTS_MOMENT.to_string(),
            event_count: 0,
        }
    }

    /// Apply the loop-shape adjustments. Consumes the result so they run once.
    ///
    /// Overlap above `overlap_threshold` scales the total by
    /// `1 - overlap * overlap_factor`; circularity above `circularity_threshold`
    /// adds a flat bonus, capped at 100.
    pub fn with_shape_adjustments(
        mut self,
        circularity: f64,
        overlap_penalty: f64,
        rules: &ShapeAdjustment,
    ) -> Self {
        let mut total = self.total_score as f64;
        if overlap_penalty > rules.overlap_threshold {
            total = (total * (1.0 - overlap_penalty * rules.overlap_factor)).round();
        }
        if circularity > rules.circularity_threshold {
            total += rules.circularity_bonus;
        }
        self.total_score = total.clamp(0.0, 100.0) as u32;
        self
    }
}

/// Post-hoc loop-shape adjustment parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeAdjustment {
    pub overlap_threshold: f64,
    pub overlap_factor: f64,
    pub circularity_threshold: f64,
    pub circularity_bonus: f64,
}

impl Default for ShapeAdjustment {
    fn default() -> Self {
        ShapeAdjustment {
            overlap_threshold: 0.1,
            overlap_factor: 0.3,
            circularity_threshold: 0.4,
            circularity_bonus: 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(total: u32) -> FloorabilityResult {
        FloorabilityResult {
            total_score: total,
            ..FloorabilityResult::zero()
        }
    }

    #[test]
    fn test_event_formatting() {
        let at = Coordinates::new(41.0, -73.8).unwrap();
        let event = FloorItEvent::new(
            EventFacts::SpeedDelta {
                from_mph: 25.0,
                to_mph: 55.0,
                road: "Taconic State Parkway",
            },
            at,
            90.0,
            2.0,
        );
        assert_eq!(event.kind, EventKind::SpeedDelta);
        assert_eq!(event.label, "25→55 mph");
        assert!(event.detail.contains("on Taconic State Parkway"));
        assert!(event.detail.contains("2.0 mi"));

        let ramp = FloorItEvent::new(EventFacts::RampMerge { ramp_miles: 0.3 }, at, 18.0, 0.0);
        assert_eq!(ramp.label, "Ramp merge");
        assert_eq!(EventKind::SignalLaunch.to_string(), "signal_launch");
    }

    #[test]
    fn test_shape_adjustments() {
        let rules = ShapeAdjustment::default();

        // Overlap 0.5 scales by 0.85
        let result = scored(60).with_shape_adjustments(0.2, 0.5, &rules);
        assert_eq!(result.total_score, 51);

        // Small overlap and good circularity: bonus only
        let result = scored(60).with_shape_adjustments(0.7, 0.05, &rules);
        assert_eq!(result.total_score, 63);

        // Bonus capped at 100
        let result = scored(99).with_shape_adjustments(0.7, 0.0, &rules);
        assert_eq!(result.total_score, 100);
    }

    #[test]
    fn test_result_json_is_lossless() {
        let at = Coordinates::new(41.0, -73.8).unwrap();
        let mut result = scored(42);
        result.raw_score = 63.125;
        result.events.push(FloorItEvent::new(
            EventFacts::SignalLaunch {
                speed_mph: 45.0,
                gap_miles: 1.2,
                road: "",
            },
            at,
            16.2,
            0.0,
        ));
        result.event_count = 1;

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""kind":"signal_launch""#));
        let back: FloorabilityResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
