use crate::models::Coordinates;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Geometry of a community-mapped element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Way { geometry: Vec<Coordinates> },
    Node { point: Coordinates },
}

/// A tagged way or node returned by the road-attribute backend.
/// Any tag may be absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoadElement {
    pub id: i64,
    #[serde(flatten)]
    pub kind: ElementKind,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

const KMH_TO_MPH: f64 = 0.621_371;

impl RoadElement {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn highway(&self) -> Option<&str> {
        self.tag("highway")
    }

    pub fn name(&self) -> Option<&str> {
        self.tag("name").filter(|n| !n.trim().is_empty())
    }

    pub fn road_ref(&self) -> Option<&str> {
        self.tag("ref").filter(|r| !r.trim().is_empty())
    }

    pub fn is_way(&self) -> bool {
        matches!(self.kind, ElementKind::Way { .. })
    }

    /// Points to test against the route: the way's vertices or the node itself
    pub fn points(&self) -> &[Coordinates] {
        match &self.kind {
            ElementKind::Way { geometry } => geometry,
            ElementKind::Node { point } => std::slice::from_ref(point),
        }
    }

    /// Posted speed in mph, if the element carries a usable `maxspeed`
    pub fn max_speed_mph(&self) -> Option<f64> {
        self.tag("maxspeed").and_then(parse_max_speed)
    }

    pub fn lanes(&self) -> Option<u32> {
        self.tag("lanes")
            .and_then(|l| l.split(';').next())
            .and_then(|l| l.trim().parse().ok())
    }

    pub fn is_traffic_signal(&self) -> bool {
        !self.is_way() && self.highway() == Some("traffic_signals")
    }

    pub fn is_motorway_link(&self) -> bool {
        self.is_way() && self.highway() == Some("motorway_link")
    }
}

/// Parse an OSM `maxspeed` value into mph.
///
/// `"55 mph"` is taken as is, bare numbers are km/h. Symbolic values
/// (`none`, `signals`, `US:urban`, ...) yield `None`.
pub fn parse_max_speed(raw: &str) -> Option<f64> {
    let first = raw.split(';').next()?.trim().to_lowercase();
    let (number, is_mph) = match first.strip_suffix("mph") {
        Some(rest) => (rest.trim(), true),
        None => (first.strip_suffix("km/h").unwrap_or(&first).trim(), false),
    };
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(if is_mph {
        value
    } else {
        (value * KMH_TO_MPH).round()
    })
}

/// All road-attribute data fetched for one route.
///
/// `degraded` marks a snapshot that stands in for a failed query; it is
/// empty and scoring proceeds without enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttributeSnapshot {
    pub elements: Vec<RoadElement>,
    #[serde(default)]
    pub degraded: bool,
}

impl AttributeSnapshot {
    pub fn new(elements: Vec<RoadElement>) -> Self {
        AttributeSnapshot {
            elements,
            degraded: false,
        }
    }

    pub fn degraded() -> Self {
        AttributeSnapshot {
            elements: Vec::new(),
            degraded: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn speed_ways(&self) -> impl Iterator<Item = &RoadElement> {
        self.elements
            .iter()
            .filter(|e| e.is_way() && e.max_speed_mph().is_some())
    }

    pub fn signals(&self) -> impl Iterator<Item = &RoadElement> {
        self.elements.iter().filter(|e| e.is_traffic_signal())
    }

    pub fn ramps(&self) -> impl Iterator<Item = &RoadElement> {
        self.elements.iter().filter(|e| e.is_motorway_link())
    }

    /// Ways carrying lane or surface information
    pub fn quality_ways(&self) -> impl Iterator<Item = &RoadElement> {
        self.elements
            .iter()
            .filter(|e| e.is_way() && (e.lanes().is_some() || e.tag("surface").is_some()))
    }
}
