use crate::models::Coordinates;
use crate::services::geometry;

/// Bounding boxes more elongated than this are lines, not loops
const MAX_ASPECT_RATIO: f64 = 5.0;

const OVERLAP_MIN_POINTS: usize = 10;
const OVERLAP_MAX_SAMPLES: usize = 100;
/// Two sampled points this close are the same piece of road
const OVERLAP_RADIUS_M: f64 = 50.0;
/// Minimum index separation, as a fraction of the route, for a revisit
const OVERLAP_MIN_INDEX_FRACTION: f64 = 0.1;

const TURNAROUND_WINDOW_FRACTION: f64 = 0.05;
const TURNAROUND_RETURN_M: f64 = 55.0;
const TURNAROUND_BULGE_M: f64 = 2.0 * TURNAROUND_RETURN_M;
const TURNAROUND_SCALE: f64 = 3.0;

/// Shape metrics of one candidate loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopShape {
    pub circularity: f64,
    pub overlap_penalty: f64,
}

impl LoopShape {
    pub fn of(coords: &[Coordinates]) -> Self {
        LoopShape {
            circularity: circularity(coords),
            overlap_penalty: overlap_penalty(coords),
        }
    }
}

/// Enclosed area over bounding-box area, in [0, 1].
/// A circle is about 0.78, a line or an out-and-back about 0.
pub fn circularity(coords: &[Coordinates]) -> f64 {
    if coords.len() < 3 {
        return 0.0;
    }

    let local = geometry::to_local_miles(coords);
    let (width, height) = geometry::bounding_box_size(&local);
    if width <= 0.0 || height <= 0.0 {
        return 0.0;
    }
    if width.max(height) / width.min(height) > MAX_ASPECT_RATIO {
        return 0.0;
    }

    let area = geometry::shoelace_area(&local).abs();
    (area / (width * height)).clamp(0.0, 1.0)
}

/// How much of the route retraces itself, in [0, 1].
/// The larger of global overlap and local turnarounds.
pub fn overlap_penalty(coords: &[Coordinates]) -> f64 {
    if coords.len() < OVERLAP_MIN_POINTS {
        return 0.0;
    }
    global_overlap(coords)
        .max(turnaround_fraction(coords))
        .clamp(0.0, 1.0)
}

/// Fraction of evenly sampled points that another sample far away by
/// index comes back within [`OVERLAP_RADIUS_M`] of
fn global_overlap(coords: &[Coordinates]) -> f64 {
    let n = coords.len();
    let sample_count = n.min(OVERLAP_MAX_SAMPLES);
    let samples: Vec<usize> = (0..sample_count).map(|k| k * n / sample_count).collect();
    let min_gap = ((n as f64 * OVERLAP_MIN_INDEX_FRACTION).ceil() as usize).max(1);

    let overlapping = samples
        .iter()
        .filter(|&&i| {
            samples.iter().any(|&j| {
                i.abs_diff(j) >= min_gap && coords[i].distance_m(&coords[j]) <= OVERLAP_RADIUS_M
            })
        })
        .count();

    overlapping as f64 / sample_count as f64
}

/// Fraction of windows where the route heads out and comes straight back
/// within 2 to 5 windows, scaled up since a single U-turn is already bad
fn turnaround_fraction(coords: &[Coordinates]) -> f64 {
    let n = coords.len();
    let window = ((n as f64 * TURNAROUND_WINDOW_FRACTION) as usize).max(1);

    let mut windows = 0usize;
    let mut turnarounds = 0usize;
    for start in (0..n).step_by(window) {
        windows += 1;
        let origin = &coords[start];

        let turned = (2..=5)
            .map(|k| start + k * window)
            .take_while(|&end| end < n)
            .any(|end| {
                origin.distance_m(&coords[end]) <= TURNAROUND_RETURN_M
                    && coords[start + 1..end]
                        .iter()
                        .any(|p| origin.distance_m(p) > TURNAROUND_BULGE_M)
            });
        if turned {
            turnarounds += 1;
        }
    }

    if windows == 0 {
        return 0.0;
    }
    (turnarounds as f64 / windows as f64 * TURNAROUND_SCALE).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    /// Closed square, `per_side` points per side, ~2.2 mi sides
    fn square(per_side: usize) -> Vec<Coordinates> {
        let corners = [
            (41.0, -73.8),
            (41.0, -73.758),
            (41.032, -73.758),
            (41.032, -73.8),
        ];
        let mut path = Vec::new();
        for side in 0..4 {
            let (a, b) = (corners[side], corners[(side + 1) % 4]);
            for k in 0..per_side {
                let t = k as f64 / per_side as f64;
                path.push(c(a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t));
            }
        }
        path.push(path[0]);
        path
    }

    fn out_and_back(points_each_way: usize) -> Vec<Coordinates> {
        let outbound: Vec<_> = (0..points_each_way)
            .map(|i| c(41.0 + i as f64 * 0.001, -73.8))
            .collect();
        let mut path = outbound.clone();
        path.extend(outbound.iter().rev().skip(1).copied());
        path
    }

    #[test]
    fn test_square_loop_is_circular() {
        let path = square(25);
        let shape = LoopShape::of(&path);
        assert!(shape.circularity > 0.5);
        assert!(shape.overlap_penalty < 0.1);
    }

    #[test]
    fn test_out_and_back_is_all_overlap() {
        let path = out_and_back(100);
        assert!(circularity(&path) < 0.01);
        assert!(overlap_penalty(&path) > 0.8);
    }

    #[test]
    fn test_elongated_box_is_not_a_loop() {
        // Thin rectangle, aspect well above 5:1
        let path = vec![
            c(41.0, -73.8),
            c(41.0, -73.6),
            c(41.01, -73.6),
            c(41.01, -73.8),
        ];
        assert_eq!(circularity(&path), 0.0);
    }

    #[test]
    fn test_short_inputs_score_zero() {
        assert_eq!(circularity(&[]), 0.0);
        assert_eq!(circularity(&[c(41.0, -73.8), c(41.1, -73.7)]), 0.0);

        let nine: Vec<_> = (0..9).map(|i| c(41.0, -73.8 + i as f64 * 0.001)).collect();
        assert_eq!(overlap_penalty(&nine), 0.0);
    }

    #[test]
    fn test_metrics_stay_in_range() {
        let paths = vec![
            square(3),
            square(60),
            out_and_back(10),
            out_and_back(400),
            (0..50)
                .map(|i| {
                    let t = i as f64 * 0.7;
                    c(41.0 + 0.02 * t.sin(), -73.8 + 0.03 * (t * 1.3).cos())
                })
                .collect(),
            vec![c(41.0, -73.8); 12],
        ];

        for path in paths {
            let shape = LoopShape::of(&path);
            assert!((0.0..=1.0).contains(&shape.circularity));
            assert!((0.0..=1.0).contains(&shape.overlap_penalty));
        }
    }

    #[test]
    fn test_spur_adds_overlap() {
        // Loop with an eastward spur that doubles back on itself
        let mut path = square(40);
        let spur_base = path[60];
        let spur: Vec<_> = (1..=30)
            .map(|i| c(spur_base.lat, spur_base.lng + i as f64 * 0.0005))
            .collect();
        let insert_at = 61;
        let mut with_spur: Vec<_> = path.drain(..insert_at).collect();
        with_spur.extend(spur.iter().copied());
        with_spur.extend(spur.iter().rev().skip(1).copied());
        with_spur.push(spur_base);
        with_spur.extend(path);

        assert!(overlap_penalty(&square(40)) < 0.05);
        assert!(overlap_penalty(&with_spur) > 0.1);
    }
}
