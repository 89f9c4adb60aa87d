pub mod attributes;
pub mod coordinates;
pub mod floorability;
pub mod loop_route;
pub mod route;

pub use attributes::{AttributeSnapshot, ElementKind, RoadElement};
pub use coordinates::Coordinates;
pub use floorability::{
    EventFacts, EventKind, FloorItEvent, FloorabilityResult, RawScores, ShapeAdjustment,
    SpeedProfileEntry,
};
pub use loop_route::{
    GenerationMethod, LoopCandidate, ScoredLoopRoute, ScoredRoute, WaypointPattern,
};
pub use route::{NormalizedRoute, RouteLeg, RouteStep};
