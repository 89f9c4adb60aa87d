use crate::constants::METERS_PER_MILE;
use crate::models::Coordinates;

/// Miles per degree of latitude (mean)
const MILES_PER_DEGREE_LAT: f64 = 69.0;

/// Index and distance (meters) of the route point nearest to `point`
pub fn nearest_point(route: &[Coordinates], point: &Coordinates) -> Option<(usize, f64)> {
    route
        .iter()
        .enumerate()
        .map(|(idx, c)| (idx, c.distance_m(point)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Closest (route index, meters) over every point of an element
pub fn nearest_to_any(route: &[Coordinates], points: &[Coordinates]) -> Option<(usize, f64)> {
    points
        .iter()
        .filter_map(|p| nearest_point(route, p))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Running distance (meters) from the first point to each point
pub fn cumulative_distances_m(path: &[Coordinates]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(path.len());
    for (idx, point) in path.iter().enumerate() {
        if idx > 0 {
            total += path[idx - 1].distance_m(point);
        }
        out.push(total);
    }
    out
}

pub fn path_length_m(path: &[Coordinates]) -> f64 {
    path.windows(2).map(|w| w[0].distance_m(&w[1])).sum()
}

pub fn path_length_miles(path: &[Coordinates]) -> f64 {
    path_length_m(path) / METERS_PER_MILE
}

/// Smallest angle between two bearings, in [0, 180]
pub fn bearing_delta(a_deg: f64, b_deg: f64) -> f64 {
    let diff = (a_deg - b_deg).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Bearing from the first point to the point farthest from it
pub fn reach_bearing(path: &[Coordinates]) -> Option<f64> {
    let origin = path.first()?;
    let farthest = path.iter().skip(1).max_by(|a, b| {
        origin
            .distance_m(a)
            .partial_cmp(&origin.distance_m(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    })?;
    (origin.distance_m(farthest) > 0.0).then(|| origin.bearing_to(farthest))
}

/// Project onto a local plane in miles (x east, y north), origin at the first point.
/// Equirectangular, fine for loops a few tens of miles across.
pub fn to_local_miles(path: &[Coordinates]) -> Vec<(f64, f64)> {
    let Some(origin) = path.first() else {
        return Vec::new();
    };
    let miles_per_degree_lng = MILES_PER_DEGREE_LAT * origin.lat.to_radians().cos();
    path.iter()
        .map(|c| {
            (
                (c.lng - origin.lng) * miles_per_degree_lng,
                (c.lat - origin.lat) * MILES_PER_DEGREE_LAT,
            )
        })
        .collect()
}

/// Signed polygon area using the Shoelace formula. The ring is closed implicitly.
pub fn shoelace_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].0 * points[j].1;
        area -= points[j].0 * points[i].1;
    }

    area / 2.0
}

/// (width, height) of the axis-aligned bounding box
pub fn bounding_box_size(points: &[(f64, f64)]) -> (f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0);
    }
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(x, y) in points {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    (max_x - min_x, max_y - min_y)
}
