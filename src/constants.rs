//! Stable application-wide constants.
//!
//! Values here are unit conversions, wire-protocol limits, and default
//! fallbacks for env-var-based configuration. Scoring weights and generator
//! tuning knobs live in [`ScoringConfig`](crate::config::ScoringConfig) and
//! [`LoopGeneratorConfig`](crate::config::LoopGeneratorConfig) instead.

pub const METERS_PER_MILE: f64 = 1_609.344;
pub const FEET_PER_MILE: f64 = 5_280.0;

// --- Server defaults (used when HOST / PORT env vars are absent) ---

/// Default bind address for the HTTP server.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default port for the HTTP server.
pub const DEFAULT_PORT: &str = "3000";

// --- Routing backend ---

/// Primary OSRM-compatible driving router.
pub const DEFAULT_ROUTING_PRIMARY_URL: &str = "https://router.project-osrm.org";
/// Secondary router used after the primary fails.
pub const DEFAULT_ROUTING_SECONDARY_URL: &str = "https://routing.openstreetmap.de/routed-car";
/// Per-call time box for route and trip requests.
pub const DEFAULT_ROUTING_TIMEOUT_SECONDS: u64 = 8;
/// How long the secondary stays active before the primary is retried.
pub const DEFAULT_FAILOVER_COOLDOWN_SECONDS: u64 = 300;
/// Consecutive primary failures before subsequent calls go straight to the secondary.
pub const DEFAULT_FAILOVER_THRESHOLD: u32 = 2;
/// OSRM rejects requests with more coordinates than this on the public servers.
pub const MAX_ROUTE_COORDINATES: usize = 25;

// --- Road attribute backend ---

/// Overpass endpoints, rotated round-robin per query
pub const DEFAULT_OVERPASS_ENDPOINTS: &[&str] = &[
    "https://overpass-api.de/api/interpreter",
    "https://overpass.private.coffee/api/interpreter",
    "https://maps.mail.ru/osm/tools/overpass/api/interpreter",
];
pub const DEFAULT_OVERPASS_TIMEOUT_SECONDS: u64 = 15;
/// Upper bound on polyline samples sent in one query, whatever the route length.
pub const MAX_ATTRIBUTE_SAMPLES: usize = 40;
/// Proximity radii (meters) per element class in the attribute query
pub const SPEED_WAY_RADIUS_M: u32 = 50;
pub const SIGNAL_NODE_RADIUS_M: u32 = 150;
pub const MOTORWAY_LINK_RADIUS_M: u32 = 250;
pub const LANE_WAY_RADIUS_M: u32 = 100;
/// Snapshot cache defaults
pub const DEFAULT_ATTRIBUTE_CACHE_TTL_SECONDS: u64 = 600;
pub const DEFAULT_ATTRIBUTE_CACHE_MAX_ENTRIES: u64 = 256;

// --- Matcher ---

/// Elements farther than this from the route are never matched.
pub const MATCH_MAX_DISTANCE_MILES: f64 = 0.04;
/// Profile entries closer than this many route indices are near-duplicates.
pub const PROFILE_DEDUP_INDEX_WINDOW: usize = 10;
/// A major road never reports a posted speed below this.
pub const MAJOR_ROAD_MIN_SPEED_MPH: f64 = 30.0;

// --- Final ranking ---

/// Display colours assigned by final rank
pub const ROUTE_COLORS: &[&str] = &["#FF6B35", "#2EC4B6", "#E71D36", "#FFB627", "#7B61FF"];
/// Prepended to highlights when no route clears the minimum score
pub const LIMITED_OPPORTUNITY_MARKER: &str = "Limited floor-it opportunity in this area";
/// Highlight for candidates scored without road data
pub const DEGRADED_DATA_NOTE: &str = "Road data unavailable, score may be understated";
