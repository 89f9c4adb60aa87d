use crate::config::AttributeConfig;
use crate::constants::*;
use crate::error::{AppError, Result};
use crate::models::{AttributeSnapshot, Coordinates, ElementKind, RoadElement};
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of tagged road data near a route.
/// Never fails: an unreachable backend yields a degraded, empty snapshot.
#[async_trait]
pub trait RoadAttributeSource: Send + Sync {
    async fn query_attributes(&self, geometry: &[Coordinates]) -> AttributeSnapshot;
}

/// Overpass API client for road attributes near a route polyline
#[derive(Clone)]
pub struct RoadAttributeClient {
    client: Client,
    endpoints: Vec<String>,
    current_endpoint_idx: Arc<AtomicUsize>,
    timeout: Duration,
    snapshots: Cache<String, Arc<AttributeSnapshot>>,
}

impl RoadAttributeClient {
    pub fn new(config: &AttributeConfig) -> Self {
        let endpoints = if config.endpoints.is_empty() {
            DEFAULT_OVERPASS_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            config.endpoints.clone()
        };

        let snapshots = Cache::builder()
            .time_to_live(config.cache_ttl)
            .max_capacity(config.cache_max_entries)
            .build();

        RoadAttributeClient {
            client: Client::new(),
            endpoints,
            current_endpoint_idx: Arc::new(AtomicUsize::new(0)),
            timeout: config.timeout,
            snapshots,
        }
    }

    /// Get the next endpoint to try (round-robin)
    fn get_next_endpoint(&self) -> &str {
        let idx = self.current_endpoint_idx.fetch_add(1, Ordering::Relaxed);
        &self.endpoints[idx % self.endpoints.len()]
    }

    async fn execute_query(&self, query: &str) -> Result<AttributeSnapshot> {
        let endpoint = self.get_next_endpoint();

        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!("data={}", urlencoding::encode(query)))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::RoadAttributes(format!("Request to {} timed out", endpoint))
                } else {
                    AppError::RoadAttributes(format!("Request to {} failed: {}", endpoint, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::RoadAttributes(format!(
                "HTTP {} from {}: {}",
                status, endpoint, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::RoadAttributes(format!("Failed to read response: {}", e)))?;

        parse_overpass_response(&body)
    }
}

#[async_trait]
impl RoadAttributeSource for RoadAttributeClient {
    async fn query_attributes(&self, geometry: &[Coordinates]) -> AttributeSnapshot {
        let samples = sample_polyline(geometry);
        if samples.is_empty() {
            return AttributeSnapshot::default();
        }

        let query = build_query(&samples, self.timeout.as_secs());

        if let Some(cached) = self.snapshots.get(&query).await {
            tracing::debug!(
                elements = cached.elements.len(),
                "Attribute cache hit ({} elements)",
                cached.elements.len()
            );
            return (*cached).clone();
        }

        match self.execute_query(&query).await {
            Ok(snapshot) => {
                tracing::debug!(
                    samples = samples.len(),
                    elements = snapshot.elements.len(),
                    "Road attribute query returned {} elements for {} samples",
                    snapshot.elements.len(),
                    samples.len()
                );
                self.snapshots
                    .insert(query, Arc::new(snapshot.clone()))
                    .await;
                snapshot
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Road attribute query failed, continuing without enrichment: {}",
                    e
                );
                AttributeSnapshot::degraded()
            }
        }
    }
}

/// Evenly spaced subset of the route, never more than [`MAX_ATTRIBUTE_SAMPLES`] points
pub fn sample_polyline(geometry: &[Coordinates]) -> Vec<Coordinates> {
    if geometry.is_empty() {
        return Vec::new();
    }
    let step = geometry.len().div_ceil(MAX_ATTRIBUTE_SAMPLES).max(1);
    geometry.iter().step_by(step).copied().collect()
}

/// Overpass QL union over the four element classes around the sampled polyline
pub fn build_query(samples: &[Coordinates], timeout_secs: u64) -> String {
    let polyline = samples
        .iter()
        .map(|c| format!("{:.5},{:.5}", c.lat, c.lng))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        concat!(
            "[out:json][timeout:{timeout}];(",
            r#"way["maxspeed"](around:{speed},{line});"#,
            r#"node["highway"="traffic_signals"](around:{signal},{line});"#,
            r#"way["highway"="motorway_link"](around:{link},{line});"#,
            r#"way["lanes"]["highway"~"^(motorway|trunk|primary|secondary)$"](around:{lanes},{line});"#,
            ");out body geom;"
        ),
        timeout = timeout_secs,
        speed = SPEED_WAY_RADIUS_M,
        signal = SIGNAL_NODE_RADIUS_M,
        link = MOTORWAY_LINK_RADIUS_M,
        lanes = LANE_WAY_RADIUS_M,
        line = polyline,
    )
}

/// Parse an Overpass JSON payload. Elements without usable geometry are skipped.
pub fn parse_overpass_response(body: &str) -> Result<AttributeSnapshot> {
    let parsed: OverpassResponse = serde_json::from_str(body)
        .map_err(|e| AppError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

    let elements = parsed
        .elements
        .into_iter()
        .filter_map(convert_element)
        .collect();

    Ok(AttributeSnapshot::new(elements))
}

fn convert_element(elem: OverpassElement) -> Option<RoadElement> {
    let kind = match elem.element_type.as_str() {
        "way" => {
            let geometry: Vec<Coordinates> = elem
                .geometry
                .unwrap_or_default()
                .into_iter()
                .filter_map(|p| Coordinates::new(p.lat, p.lon).ok())
                .collect();
            if geometry.is_empty() {
                return None;
            }
            ElementKind::Way { geometry }
        }
        "node" => {
            let point = Coordinates::new(elem.lat?, elem.lon?).ok()?;
            ElementKind::Node { point }
        }
        _ => return None,
    };

    Some(RoadElement {
        id: elem.id,
        kind,
        tags: elem.tags,
    })
}

// Overpass API response types

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type", default)]
    element_type: String,
    #[serde(default)]
    id: i64,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    geometry: Option<Vec<GeometryPoint>>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct GeometryPoint {
    lat: f64,
    lon: f64,
}
