use common::AttributeMode;
use floorit::config::AttributeConfig;
use floorit::models::{Coordinates, ElementKind};
use floorit::services::overpass::{RoadAttributeClient, RoadAttributeSource};
use std::time::Duration;

mod common;

fn attribute_config(endpoints: Vec<String>) -> AttributeConfig {
    AttributeConfig {
        endpoints,
        timeout: Duration::from_secs(2),
        ..AttributeConfig::default()
    }
}

/// A straight 2-mile line heading north from the start point
fn polyline(points: usize) -> Vec<Coordinates> {
    let start = common::start_point();
    (0..points)
        .map(|i| start.offset(0.0, 3_200.0 * i as f64 / (points - 1) as f64))
        .collect()
}

#[tokio::test]
async fn test_query_returns_elements_near_route() {
    let overpass = common::spawn_overpass(AttributeMode::SpeedStep).await;
    let client = RoadAttributeClient::new(&attribute_config(vec![overpass.url.clone()]));

    let route = polyline(200);
    let snapshot = client.query_attributes(&route).await;

    assert!(!snapshot.degraded);
    assert_eq!(snapshot.elements.len(), 2);
    for element in &snapshot.elements {
        assert!(matches!(element.kind, ElementKind::Way { .. }));
        let nearest = route
            .iter()
            .map(|c| c.distance_m(&element.points()[0]))
            .fold(f64::INFINITY, f64::min);
        assert!(nearest < 10.0, "Element {} is {}m off route", element.id, nearest);
    }
    let speeds: Vec<f64> = snapshot
        .elements
        .iter()
        .filter_map(|e| e.max_speed_mph())
        .collect();
    assert_eq!(speeds, vec![25.0, 55.0]);
}

#[tokio::test]
async fn test_failing_backend_degrades_instead_of_erroring() {
    let overpass = common::spawn_overpass(AttributeMode::Failing).await;
    let client = RoadAttributeClient::new(&attribute_config(vec![overpass.url.clone()]));

    let snapshot = client.query_attributes(&polyline(50)).await;

    assert!(snapshot.degraded);
    assert!(snapshot.elements.is_empty());
    assert_eq!(overpass.hits(), 1);
}

#[tokio::test]
async fn test_unreachable_endpoint_degrades() {
    // Nothing listens on port 9 of localhost
    let client = RoadAttributeClient::new(&attribute_config(vec![
        "http://127.0.0.1:9/api/interpreter".to_string(),
    ]));

    assert!(client.query_attributes(&polyline(20)).await.degraded);
}

#[tokio::test]
async fn test_repeat_queries_are_cached() {
    let overpass = common::spawn_overpass(AttributeMode::SpeedStep).await;
    let client = RoadAttributeClient::new(&attribute_config(vec![overpass.url.clone()]));
    let route = polyline(120);

    let first = client.query_attributes(&route).await;
    let second = client.query_attributes(&route).await;

    assert_eq!(first, second);
    assert_eq!(overpass.hits(), 1);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let overpass = common::spawn_overpass(AttributeMode::Failing).await;
    let client = RoadAttributeClient::new(&attribute_config(vec![overpass.url.clone()]));
    let route = polyline(30);

    client.query_attributes(&route).await;
    client.query_attributes(&route).await;

    assert_eq!(overpass.hits(), 2);
}

#[tokio::test]
async fn test_endpoints_are_used_round_robin() {
    let first = common::spawn_overpass(AttributeMode::Empty).await;
    let second = common::spawn_overpass(AttributeMode::Empty).await;
    let client = RoadAttributeClient::new(&attribute_config(vec![
        first.url.clone(),
        second.url.clone(),
    ]));

    // Distinct routes so the cache does not answer
    for points in [20, 30, 40, 50] {
        let snapshot = client.query_attributes(&polyline(points)).await;
        assert!(!snapshot.degraded);
    }

    assert_eq!(first.hits(), 2);
    assert_eq!(second.hits(), 2);
}

#[tokio::test]
async fn test_live_overpass_query() {
    if !common::live_tests_enabled() {
        println!("Skipping live Overpass test");
        return;
    }

    let client = RoadAttributeClient::new(&AttributeConfig::default());
    let snapshot = client.query_attributes(&polyline(60)).await;

    if snapshot.degraded {
        println!("Overpass unavailable, snapshot degraded");
        return;
    }
    for element in &snapshot.elements {
        for point in element.points() {
            assert!(point.lat >= -90.0 && point.lat <= 90.0);
            assert!(point.lng >= -180.0 && point.lng <= 180.0);
        }
    }
}
