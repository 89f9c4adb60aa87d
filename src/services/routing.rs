use crate::config::RoutingConfig;
use crate::constants::MAX_ROUTE_COORDINATES;
use crate::error::{AppError, Result};
use crate::models::{Coordinates, NormalizedRoute, RouteLeg, RouteStep};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PRIMARY: usize = 0;
const SECONDARY: usize = 1;

/// Source of driving routes for the loop generator.
/// Failures come back as `None`, never as errors.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Route from `start` through `waypoints` in the given order
    async fn fetch_route(
        &self,
        start: Coordinates,
        waypoints: &[Coordinates],
    ) -> Option<NormalizedRoute>;

    /// Optimized round trip from `start` through `waypoints` and back.
    /// Falls back to `fetch_route` with the start appended.
    async fn fetch_trip(&self, start: Coordinates, waypoints: &[Coordinates])
        -> Option<NormalizedRoute>;
}

/// Which routing backend is active.
///
/// After `threshold` consecutive primary failures calls go to the secondary
/// until `cooldown` has passed since the switch. Lock-free, so one state can
/// be shared by several clients, or each client can own its own.
#[derive(Debug)]
pub struct FailoverState {
    epoch: Instant,
    active: AtomicUsize,
    switched_at_ms: AtomicU64,
    primary_failures: AtomicU32,
    cooldown: Duration,
    threshold: u32,
}

impl FailoverState {
    pub fn new(cooldown: Duration, threshold: u32) -> Self {
        FailoverState {
            epoch: Instant::now(),
            active: AtomicUsize::new(PRIMARY),
            switched_at_ms: AtomicU64::new(0),
            primary_failures: AtomicU32::new(0),
            cooldown,
            threshold: threshold.max(1),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Backend index for the next call; resets to the primary once cooled down
    pub fn active_backend(&self) -> usize {
        if self.active.load(Ordering::Acquire) == SECONDARY {
            let switched_at = self.switched_at_ms.load(Ordering::Acquire);
            if self.now_ms().saturating_sub(switched_at) >= self.cooldown.as_millis() as u64 {
                if self
                    .active
                    .compare_exchange(SECONDARY, PRIMARY, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.primary_failures.store(0, Ordering::Release);
                    tracing::info!("Routing failover cool-down elapsed, retrying primary backend");
                }
                return PRIMARY;
            }
            return SECONDARY;
        }
        PRIMARY
    }

    pub fn is_failed_over(&self) -> bool {
        self.active_backend() == SECONDARY
    }

    /// Returns true when this failure switched subsequent calls to the secondary
    pub fn record_primary_failure(&self) -> bool {
        let failures = self.primary_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.threshold {
            self.switched_at_ms.store(self.now_ms(), Ordering::Release);
            if self
                .active
                .compare_exchange(PRIMARY, SECONDARY, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                tracing::warn!(
                    failures = failures,
                    cooldown_s = self.cooldown.as_secs(),
                    "Primary routing backend failed {} times, switching to secondary for {}s",
                    failures,
                    self.cooldown.as_secs()
                );
                return true;
            }
        }
        false
    }

    pub fn record_primary_success(&self) {
        self.primary_failures.store(0, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Route,
    Trip,
}

impl Service {
    fn path(self) -> &'static str {
        match self {
            Service::Route => "route",
            Service::Trip => "trip",
        }
    }
}

/// OSRM-compatible driving router client with primary/secondary failover
#[derive(Clone)]
pub struct RoutingClient {
    client: Client,
    backends: [String; 2],
    timeout: Duration,
    failover: Arc<FailoverState>,
}

impl RoutingClient {
    pub fn new(config: &RoutingConfig) -> Self {
        let failover = Arc::new(FailoverState::new(
            config.failover_cooldown,
            config.failover_threshold,
        ));
        Self::with_failover_state(config, failover)
    }

    /// Build a client around an existing failover state
    pub fn with_failover_state(config: &RoutingConfig, failover: Arc<FailoverState>) -> Self {
        RoutingClient {
            client: Client::new(),
            backends: [
                config.primary_url.trim_end_matches('/').to_string(),
                config.secondary_url.trim_end_matches('/').to_string(),
            ],
            timeout: config.timeout,
            failover,
        }
    }

    pub fn failover_state(&self) -> &Arc<FailoverState> {
        &self.failover
    }

    /// "primary" or "secondary"
    pub fn active_backend_name(&self) -> &'static str {
        if self.failover.is_failed_over() {
            "secondary"
        } else {
            "primary"
        }
    }

    async fn request(&self, service: Service, coords: &[Coordinates]) -> Option<NormalizedRoute> {
        if coords.len() < 2 || coords.len() > MAX_ROUTE_COORDINATES {
            tracing::warn!(
                coordinates = coords.len(),
                "Routing request with {} coordinates rejected (2..={} allowed)",
                coords.len(),
                MAX_ROUTE_COORDINATES
            );
            return None;
        }

        let active = self.failover.active_backend();
        match self.call_backend(active, service, coords).await {
            Ok(route) => {
                if active == PRIMARY {
                    self.failover.record_primary_success();
                }
                Some(route)
            }
            Err(e) if active == PRIMARY => {
                tracing::warn!(
                    service = service.path(),
                    error = %e,
                    "Primary routing backend failed for {}: {}, trying secondary",
                    service.path(),
                    e
                );
                self.failover.record_primary_failure();
                match self.call_backend(SECONDARY, service, coords).await {
                    Ok(route) => Some(route),
                    Err(e) => {
                        tracing::warn!(
                            service = service.path(),
                            error = %e,
                            "Secondary routing backend failed for {}: {}",
                            service.path(),
                            e
                        );
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    service = service.path(),
                    error = %e,
                    "Secondary routing backend failed for {}: {}",
                    service.path(),
                    e
                );
                None
            }
        }
    }

    async fn call_backend(
        &self,
        backend: usize,
        service: Service,
        coords: &[Coordinates],
    ) -> Result<NormalizedRoute> {
        // Format coordinates as "lng,lat;lng,lat;..."
        let coordinates_str = coords
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/{}/v1/driving/{}",
            self.backends[backend],
            service.path(),
            coordinates_str
        );

        tracing::debug!(
            backend = backend,
            service = service.path(),
            coordinates = coords.len(),
            "Routing request: {} with {} coordinates",
            service.path(),
            coords.len()
        );

        let mut request = self
            .client
            .get(&url)
            .query(&[
                ("overview", "full"),
                ("geometries", "geojson"),
                ("steps", "true"),
            ])
            .timeout(self.timeout);

        if service == Service::Trip {
            request = request.query(&[("roundtrip", "true"), ("source", "first")]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Routing(format!("Request timed out after {:?}", self.timeout))
            } else {
                AppError::Routing(format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Routing(format!("HTTP {}: {}", status, error_text)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Routing(format!("Failed to read response: {}", e)))?;

        let route = parse_osrm_response(&body, service == Service::Trip)?;
        tracing::debug!(
            distance_mi = %format!("{:.2}", route.distance_miles()),
            duration_min = %format!("{:.0}", route.duration_minutes()),
            path_points = route.geometry.len(),
            "Routing response: {:.2}mi, {:.0}min, {} path points",
            route.distance_miles(),
            route.duration_minutes(),
            route.geometry.len()
        );
        Ok(route)
    }
}

#[async_trait]
impl RouteProvider for RoutingClient {
    async fn fetch_route(
        &self,
        start: Coordinates,
        waypoints: &[Coordinates],
    ) -> Option<NormalizedRoute> {
        if waypoints.is_empty() {
            return None;
        }
        let mut coords = Vec::with_capacity(waypoints.len() + 1);
        coords.push(start);
        coords.extend_from_slice(waypoints);
        self.request(Service::Route, &coords).await
    }

    async fn fetch_trip(
        &self,
        start: Coordinates,
        waypoints: &[Coordinates],
    ) -> Option<NormalizedRoute> {
        if waypoints.is_empty() {
            return None;
        }
        let mut coords = Vec::with_capacity(waypoints.len() + 1);
        coords.push(start);
        coords.extend_from_slice(waypoints);

        if let Some(route) = self.request(Service::Trip, &coords).await {
            return Some(route);
        }

        tracing::debug!(
            waypoints = waypoints.len(),
            "Trip endpoint unavailable, falling back to ordered route back to start"
        );
        let mut closed = waypoints.to_vec();
        closed.push(start);
        self.fetch_route(start, &closed).await
    }
}

/// Parse an OSRM route or trip payload into a [`NormalizedRoute`].
///
/// Missing fields default to empty/zero; a non-"Ok" code or an empty
/// geometry is a malformed response.
pub fn parse_osrm_response(body: &str, is_trip: bool) -> Result<NormalizedRoute> {
    let parsed: OsrmResponse = serde_json::from_str(body)
        .map_err(|e| AppError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

    if parsed.code != "Ok" {
        return Err(AppError::MalformedResponse(format!(
            "Backend returned code '{}'{}",
            parsed.code,
            parsed
                .message
                .map(|m| format!(": {}", m))
                .unwrap_or_default()
        )));
    }

    let candidates = if is_trip { parsed.trips } else { parsed.routes };
    let route = candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::MalformedResponse("No routes found".to_string()))?;

    let geometry: Vec<Coordinates> = route
        .geometry
        .coordinates
        .iter()
        .filter_map(|pair| Coordinates::from_lng_lat(*pair).ok())
        .collect();
    if geometry.len() < 2 {
        return Err(AppError::MalformedResponse(
            "Route geometry is empty".to_string(),
        ));
    }

    let legs = route
        .legs
        .into_iter()
        .map(|leg| RouteLeg {
            distance_m: leg.distance,
            duration_s: leg.duration,
            steps: leg
                .steps
                .into_iter()
                .map(|step| RouteStep {
                    name: step.name.trim().to_string(),
                    road_ref: step.road_ref.filter(|r| !r.trim().is_empty()),
                    distance_m: step.distance,
                    duration_s: step.duration,
                    maneuver: step.maneuver.kind,
                })
                .collect(),
        })
        .collect();

    Ok(NormalizedRoute {
        distance_m: route.distance,
        duration_s: route.duration,
        geometry,
        legs,
    })
}

// OSRM API response types

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    routes: Vec<OsrmRoute>,
    trips: Vec<OsrmRoute>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsrmRoute {
    distance: f64, // meters
    duration: f64, // seconds
    geometry: OsrmGeometry,
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>, // [lng, lat] pairs
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsrmLeg {
    distance: f64,
    duration: f64,
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsrmStep {
    name: String,
    #[serde(rename = "ref")]
    road_ref: Option<String>,
    distance: f64,
    duration: f64,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
}
