//! Local stand-ins for the routing and road-attribute backends.
//!
//! Each mock is a small axum app bound to an ephemeral port, so the real
//! clients are exercised over HTTP without any network access.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use floorit::config::{
    AttributeConfig, Config, LoopGeneratorConfig, RoutingConfig, ScoringConfig,
};
use floorit::models::Coordinates;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulated driving speed of the mock router
const MOCK_SPEED_MPS: f64 = 13.4;
/// Spacing of the densified mock geometry
const MOCK_SPACING_M: f64 = 100.0;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum RouterMode {
    /// Straight lines between the requested coordinates
    Healthy,
    /// HTTP 500 on every request
    Failing,
    /// Answers after the given delay
    Slow(Duration),
    /// Route works, trip answers with an OSRM error
    NoTrip,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum AttributeMode {
    /// A 25 mph way early on the route and a 55 mph way halfway
    SpeedStep,
    Empty,
    Failing,
}

struct MockState<M> {
    mode: M,
    hits: AtomicUsize,
}

/// A running mock backend
pub struct MockServer<M> {
    pub url: String,
    state: Arc<MockState<M>>,
}

#[allow(dead_code)]
impl<M> MockServer<M> {
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Mock server has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

/// Start a mock OSRM-compatible router
#[allow(dead_code)]
pub async fn spawn_router(mode: RouterMode) -> MockServer<RouterMode> {
    let state = Arc::new(MockState {
        mode,
        hits: AtomicUsize::new(0),
    });
    let app = Router::new()
        .route("/{service}/v1/driving/{coords}", get(osrm_handler))
        .with_state(state.clone());

    MockServer {
        url: serve(app).await,
        state,
    }
}

/// Start a mock Overpass endpoint
#[allow(dead_code)]
pub async fn spawn_overpass(mode: AttributeMode) -> MockServer<AttributeMode> {
    let state = Arc::new(MockState {
        mode,
        hits: AtomicUsize::new(0),
    });
    let app = Router::new()
        .route("/api/interpreter", post(overpass_handler))
        .with_state(state.clone());

    MockServer {
        url: format!("{}/api/interpreter", serve(app).await),
        state,
    }
}

async fn osrm_handler(
    State(state): State<Arc<MockState<RouterMode>>>,
    Path((service, coords)): Path<(String, String)>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    match state.mode {
        RouterMode::Failing => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "backend down").into_response()
        }
        RouterMode::Slow(delay) => tokio::time::sleep(delay).await,
        RouterMode::NoTrip if service == "trip" => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"code": "NotImplemented", "message": "trip disabled"})),
            )
                .into_response()
        }
        _ => {}
    }

    let mut points: Vec<Coordinates> = coords
        .split(';')
        .filter_map(|pair| {
            let (lng, lat) = pair.split_once(',')?;
            Coordinates::new(lat.parse().ok()?, lng.parse().ok()?).ok()
        })
        .collect();
    if service == "trip" {
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
    }

    Json(osrm_body(&service, &points)).into_response()
}

/// OSRM payload for straight segments through `points`
pub fn osrm_body(service: &str, points: &[Coordinates]) -> Value {
    let geometry = densify(points);
    let distance: f64 = geometry.windows(2).map(|w| w[0].distance_m(&w[1])).sum();
    let duration = distance / MOCK_SPEED_MPS;
    let coordinates: Vec<[f64; 2]> = geometry.iter().map(|c| c.to_lng_lat()).collect();

    let route = json!({
        "distance": distance,
        "duration": duration,
        "geometry": {"type": "LineString", "coordinates": coordinates},
        "legs": [{"distance": distance, "duration": duration, "steps": []}],
    });

    let key = if service == "trip" { "trips" } else { "routes" };
    let mut body = json!({"code": "Ok"});
    body[key] = json!([route]);
    body
}

fn densify(points: &[Coordinates]) -> Vec<Coordinates> {
    let mut out = Vec::new();
    for pair in points.windows(2) {
        let length = pair[0].distance_m(&pair[1]);
        let bearing = pair[0].bearing_to(&pair[1]);
        let pieces = (length / MOCK_SPACING_M).ceil().max(1.0) as usize;
        for i in 0..pieces {
            out.push(pair[0].offset(bearing, length * i as f64 / pieces as f64));
        }
    }
    out.extend(points.last().copied());
    out
}

async fn overpass_handler(
    State(state): State<Arc<MockState<AttributeMode>>>,
    body: String,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    match state.mode {
        AttributeMode::Failing => {
            (StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response()
        }
        AttributeMode::Empty => Json(json!({"elements": []})).into_response(),
        AttributeMode::SpeedStep => {
            let query = body
                .strip_prefix("data=")
                .and_then(|q| urlencoding::decode(q).ok())
                .map(|q| q.into_owned())
                .unwrap_or_default();
            let samples = query_polyline(&query);
            if samples.len() < 2 {
                return Json(json!({"elements": []})).into_response();
            }

            let way = |id: i64, at: (f64, f64), speed: &str| {
                json!({
                    "type": "way",
                    "id": id,
                    "geometry": [{"lat": at.0, "lon": at.1}],
                    "tags": {"highway": "primary", "maxspeed": speed},
                })
            };
            Json(json!({
                "elements": [
                    way(1, samples[samples.len() / 10], "25 mph"),
                    way(2, samples[samples.len() / 2], "55 mph"),
                ]
            }))
            .into_response()
        }
    }
}

/// The `around` polyline of the first clause of an Overpass query
pub fn query_polyline(query: &str) -> Vec<(f64, f64)> {
    let Some(rest) = query.split("(around:").nth(1) else {
        return Vec::new();
    };
    let Some(line) = rest.split(')').next() else {
        return Vec::new();
    };
    let numbers: Vec<f64> = line
        .split(',')
        .skip(1)
        .filter_map(|n| n.trim().parse().ok())
        .collect();
    numbers.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

/// Configuration pointing at the given mock backends, with no pacing delay
#[allow(dead_code)]
pub fn test_config(primary: &str, secondary: &str, overpass: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        routing: RoutingConfig {
            primary_url: primary.to_string(),
            secondary_url: secondary.to_string(),
            timeout: Duration::from_secs(2),
            ..RoutingConfig::default()
        },
        attributes: AttributeConfig {
            endpoints: vec![overpass.to_string()],
            timeout: Duration::from_secs(2),
            ..AttributeConfig::default()
        },
        scoring: ScoringConfig::default(),
        generator: LoopGeneratorConfig {
            attribute_delay: Duration::ZERO,
            ..LoopGeneratorConfig::default()
        },
    }
}

#[allow(dead_code)]
pub fn start_point() -> Coordinates {
    Coordinates::new(41.0340, -73.7629).unwrap()
}

/// Tests against the public backends only run when FLOORIT_LIVE_TESTS is set
#[allow(dead_code)]
pub fn live_tests_enabled() -> bool {
    std::env::var("FLOORIT_LIVE_TESTS").is_ok()
}
