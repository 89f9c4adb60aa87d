//! Route-to-attribute matching.
//!
//! Road data comes back for everything near the route, including side
//! streets and roads crossing over or under it. Each element is tied to
//! the route position it is nearest to and only accepted when it plausibly
//! describes the road the route is actually on at that position.

use crate::constants::*;
use crate::models::{AttributeSnapshot, Coordinates, RoadElement, RouteLeg, SpeedProfileEntry};
use crate::services::geometry;
use std::fmt;

/// Name fragments that mark a limited-access or arterial road
const MAJOR_ROAD_KEYWORDS: &[&str] = &[
    "parkway",
    "highway",
    "interstate",
    "expressway",
    "turnpike",
    "freeway",
    "thruway",
];

/// Route-number prefixes of interstate, US and state highways
const MAJOR_REF_PREFIXES: &[&str] = &[
    "I", "US", "SR", "SH", "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID",
    "IL", "IN", "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV",
    "NH", "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

/// Highway classes that never carry a major road
const MINOR_HIGHWAY_CLASSES: &[&str] = &[
    "residential",
    "tertiary",
    "unclassified",
    "service",
    "living_street",
];

/// Lowest plausible posted speed (mph) per highway class
const CLASS_SPEED_FLOORS: &[(&str, f64)] = &[
    ("motorway", 40.0),
    ("trunk", 35.0),
    ("motorway_link", 25.0),
    ("trunk_link", 25.0),
    ("primary", 25.0),
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("ave", "avenue"),
    ("av", "avenue"),
    ("rd", "road"),
    ("pkwy", "parkway"),
    ("pky", "parkway"),
    ("hwy", "highway"),
    ("blvd", "boulevard"),
    ("dr", "drive"),
    ("ln", "lane"),
    ("expy", "expressway"),
    ("expwy", "expressway"),
    ("tpke", "turnpike"),
    ("tpk", "turnpike"),
    ("fwy", "freeway"),
    ("pl", "place"),
    ("ct", "court"),
    ("ter", "terrace"),
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
];

/// Words too generic to identify a road on their own
const INSIGNIFICANT_WORDS: &[&str] = &[
    "the", "of", "and", "street", "road", "avenue", "drive", "lane", "boulevard", "place",
    "court", "terrace", "way", "north", "south", "east", "west",
];

/// Lowercase, strip punctuation and expand common abbreviations
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == w)
                .map(|(_, long)| *long)
                .unwrap_or(w)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exact match, whole-word containment, or at least two shared significant words
pub fn names_equivalent(a: &str, b: &str) -> bool {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if short.len() >= 3 && format!(" {} ", long).contains(&format!(" {} ", short)) {
        return true;
    }

    let significant = |s: &str| -> Vec<String> {
        s.split(' ')
            .filter(|w| !INSIGNIFICANT_WORDS.contains(w))
            .map(str::to_string)
            .collect()
    };
    let a_words = significant(&a);
    let b_words = significant(&b);
    let shared = a_words.iter().filter(|w| b_words.contains(w)).count();
    shared >= 2
}

/// Canonical route number, e.g. "I-87", "I 87" and "Interstate 87" all become "I87".
/// Returns `None` for anything that is not prefix + number.
pub fn normalize_ref(raw: &str) -> Option<String> {
    let compact: String = raw
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let digits_at = compact.find(|c: char| c.is_ascii_digit())?;
    let (prefix, number) = compact.split_at(digits_at);
    if prefix.is_empty() {
        return None;
    }
    // At most one suffix letter ("9W"), so "42nd Street" is not a route number
    let suffix: Vec<char> = number.chars().skip_while(|c| c.is_ascii_digit()).collect();
    if suffix.len() > 1 || suffix.iter().any(|c| !c.is_ascii_alphabetic()) {
        return None;
    }
    let prefix = match prefix {
        "INTERSTATE" => "I",
        "ROUTE" | "STATEROUTE" => "SR",
        other => other,
    };
    Some(format!("{}{}", prefix, number))
}

/// Split an OSM multi-ref ("I 87;US 9") into normalised refs
pub fn split_refs(raw: &str) -> Vec<String> {
    raw.split(';').filter_map(normalize_ref).collect()
}

fn is_major_ref(road_ref: &str) -> bool {
    let prefix: String = road_ref.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    MAJOR_REF_PREFIXES.contains(&prefix.as_str())
}

fn has_major_keyword(name: &str) -> bool {
    let normalized = normalize_name(name);
    normalized
        .split(' ')
        .any(|w| MAJOR_ROAD_KEYWORDS.contains(&w))
}

/// Road the route is on at some position
#[derive(Debug, Clone, PartialEq)]
pub struct StepRoad {
    pub name: String,
    pub refs: Vec<String>,
    pub is_major: bool,
}

impl StepRoad {
    pub fn new(name: &str, road_ref: Option<&str>) -> Self {
        let name = name.trim().to_string();
        let mut refs = road_ref.map(split_refs).unwrap_or_default();
        // Unnamed steps are often labelled with their route number
        if let Some(name_ref) = normalize_ref(&name) {
            if !refs.contains(&name_ref) {
                refs.push(name_ref);
            }
        }
        let is_major = has_major_keyword(&name) || refs.iter().any(|r| is_major_ref(r));
        StepRoad {
            name,
            refs,
            is_major,
        }
    }

    fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Route point index → road, built from the maneuver steps
#[derive(Debug, Clone, Default)]
pub struct StepIndex {
    roads: Vec<StepRoad>,
    by_point: Vec<usize>,
}

impl StepIndex {
    pub fn road_at(&self, index: usize) -> Option<&StepRoad> {
        let step = *self.by_point.get(index)?;
        self.roads.get(step)
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }
}

/// Walk the route's cumulative distance against cumulative step distances.
/// Points past the last step end are attributed to the last step.
pub fn build_step_index(route: &[Coordinates], legs: &[RouteLeg]) -> StepIndex {
    let steps: Vec<_> = legs.iter().flat_map(|leg| leg.steps.iter()).collect();
    if steps.is_empty() || route.is_empty() {
        return StepIndex::default();
    }

    let mut step_ends = Vec::with_capacity(steps.len());
    let mut total = 0.0;
    for step in &steps {
        total += step.distance_m.max(0.0);
        step_ends.push(total);
    }

    let roads: Vec<StepRoad> = steps
        .iter()
        .map(|s| StepRoad::new(&s.name, s.road_ref.as_deref()))
        .collect();

    let last = roads.len() - 1;
    let mut current = 0;
    let by_point = geometry::cumulative_distances_m(route)
        .into_iter()
        .map(|distance| {
            while current < last && distance > step_ends[current] {
                current += 1;
            }
            current
        })
        .collect();

    StepIndex { roads, by_point }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooFar,
    NameMismatch,
    MinorRoadOnMajorStep,
    BelowClassFloor,
    SlowOnMajorStep,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::TooFar => "too far from route",
            RejectReason::NameMismatch => "name does not match route step",
            RejectReason::MinorRoadOnMajorStep => "minor road class on a major route step",
            RejectReason::BelowClassFloor => "speed below class minimum",
            RejectReason::SlowOnMajorStep => "slow speed on a major route step",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    Accept,
    Reject(RejectReason),
}

impl MatchDecision {
    pub fn is_accept(self) -> bool {
        self == MatchDecision::Accept
    }
}

/// Ties road elements to positions on one route.
/// Without maneuver steps only the distance and class-floor rules apply.
pub struct Matcher<'a> {
    route: &'a [Coordinates],
    steps: Option<StepIndex>,
}

impl<'a> Matcher<'a> {
    pub fn new(route: &'a [Coordinates], legs: Option<&[RouteLeg]>) -> Self {
        let steps = legs
            .map(|legs| build_step_index(route, legs))
            .filter(|index| !index.is_empty());
        Matcher { route, steps }
    }

    pub fn route(&self) -> &[Coordinates] {
        self.route
    }

    pub fn has_steps(&self) -> bool {
        self.steps.is_some()
    }

    pub fn road_at(&self, index: usize) -> Option<&StepRoad> {
        self.steps.as_ref().and_then(|s| s.road_at(index))
    }

    /// Nearest route index and distance in miles over all the element's points
    pub fn locate(&self, element: &RoadElement) -> Option<(usize, f64)> {
        geometry::nearest_to_any(self.route, element.points())
            .map(|(idx, meters)| (idx, meters / METERS_PER_MILE))
    }

    /// Apply the acceptance rules in order
    pub fn evaluate(
        &self,
        element: &RoadElement,
        nearest_index: usize,
        distance_miles: f64,
    ) -> MatchDecision {
        if distance_miles > MATCH_MAX_DISTANCE_MILES {
            return MatchDecision::Reject(RejectReason::TooFar);
        }

        let step = self.road_at(nearest_index);
        let highway = element.highway().unwrap_or("");
        let speed = element.max_speed_mph();

        if let Some(step) = step {
            if let (Some(element_name), true) = (element.name(), step.has_name()) {
                let element_refs = element.road_ref().map(split_refs).unwrap_or_default();
                let refs_match = element_refs.iter().any(|r| step.refs.contains(r));
                if !names_equivalent(element_name, &step.name) && !refs_match {
                    return MatchDecision::Reject(RejectReason::NameMismatch);
                }
            }

            if step.is_major && MINOR_HIGHWAY_CLASSES.contains(&highway) {
                return MatchDecision::Reject(RejectReason::MinorRoadOnMajorStep);
            }
        }

        if let Some(speed) = speed {
            let floor = CLASS_SPEED_FLOORS
                .iter()
                .find(|(class, _)| *class == highway)
                .map(|(_, floor)| *floor);
            if floor.is_some_and(|floor| speed < floor) {
                return MatchDecision::Reject(RejectReason::BelowClassFloor);
            }

            if step.is_some_and(|s| s.is_major) && speed < MAJOR_ROAD_MIN_SPEED_MPH {
                return MatchDecision::Reject(RejectReason::SlowOnMajorStep);
            }
        }

        MatchDecision::Accept
    }

    pub fn accept(&self, element: &RoadElement, nearest_index: usize, distance_miles: f64) -> bool {
        self.evaluate(element, nearest_index, distance_miles).is_accept()
    }

    /// Locate and evaluate in one go; the accepted route index
    pub fn match_element(&self, element: &RoadElement) -> Option<usize> {
        let (index, distance_miles) = self.locate(element)?;
        match self.evaluate(element, index, distance_miles) {
            MatchDecision::Accept => Some(index),
            MatchDecision::Reject(reason) => {
                tracing::trace!(
                    element_id = element.id,
                    index = index,
                    "Rejected element {} at index {}: {}",
                    element.id,
                    index,
                    reason
                );
                None
            }
        }
    }

    fn entry_matches_step(&self, entry: &SpeedProfileEntry) -> bool {
        self.road_at(entry.index)
            .is_some_and(|step| names_equivalent(&entry.road_name, &step.name))
    }

    /// Posted speeds along the route, ordered by index, near-duplicates collapsed
    pub fn build_speed_profile(&self, snapshot: &AttributeSnapshot) -> Vec<SpeedProfileEntry> {
        let mut entries: Vec<SpeedProfileEntry> = snapshot
            .speed_ways()
            .filter_map(|way| {
                let index = self.match_element(way)?;
                Some(SpeedProfileEntry {
                    index,
                    speed_mph: way.max_speed_mph()?,
                    road_name: way.name().unwrap_or_default().to_string(),
                    highway: way.highway().unwrap_or_default().to_string(),
                })
            })
            .collect();
        entries.sort_by_key(|e| e.index);

        self.dedup_profile(entries)
    }

    /// Entries within the dedup window of a cluster's kept entry join that
    /// cluster. The kept entry is the first whose name matches the route
    /// step there, else the earliest.
    fn dedup_profile(&self, entries: Vec<SpeedProfileEntry>) -> Vec<SpeedProfileEntry> {
        let mut kept: Vec<SpeedProfileEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(last) = kept.last_mut() {
                if entry.index - last.index <= PROFILE_DEDUP_INDEX_WINDOW {
                    if !self.entry_matches_step(last) && self.entry_matches_step(&entry) {
                        *last = entry;
                    }
                    continue;
                }
            }
            kept.push(entry);
        }
        kept
    }
}
