use geo::{Bearing, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::constants::METERS_PER_MILE;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!(
                "Invalid latitude: {} (must be between -90 and 90)",
                lat
            ));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(format!(
                "Invalid longitude: {} (must be between -180 and 180)",
                lng
            ));
        }
        Ok(Coordinates { lat, lng })
    }

    /// Build from a GeoJSON / OSRM `[lng, lat]` pair.
    pub fn from_lng_lat(pair: [f64; 2]) -> Result<Self, String> {
        Self::new(pair[1], pair[0])
    }

    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    pub fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }

    /// Great-circle distance in meters
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        Haversine.distance(self.to_point(), other.to_point())
    }

    pub fn distance_miles(&self, other: &Coordinates) -> f64 {
        self.distance_m(other) / METERS_PER_MILE
    }

    /// Initial bearing towards `other`, degrees clockwise from north in [0, 360)
    pub fn bearing_to(&self, other: &Coordinates) -> f64 {
        Haversine.bearing(self.to_point(), other.to_point()).rem_euclid(360.0)
    }

    /// Point reached by travelling `distance_m` along `bearing_deg`.
    /// Flat-earth offset; the generator only projects a few miles out.
    pub fn offset(&self, bearing_deg: f64, distance_m: f64) -> Coordinates {
        let bearing = bearing_deg.to_radians();
        let dlat = distance_m * bearing.cos() / 111_320.0;
        let dlng = distance_m * bearing.sin() / (111_320.0 * self.lat.to_radians().cos());
        Coordinates {
            lat: (self.lat + dlat).clamp(-90.0, 90.0),
            lng: (self.lng + dlng + 180.0).rem_euclid(360.0) - 180.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_validation() {
        assert!(Coordinates::new(41.0, -73.8).is_ok());
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, 181.0).is_err());
        assert!(Coordinates::from_lng_lat([-73.8, 41.0]).is_ok());
    }

    #[test]
    fn test_distance() {
        let paris = Coordinates::new(48.8566, 2.3522).unwrap();
        let london = Coordinates::new(51.5074, -0.1278).unwrap();

        // Roughly 344 km
        let km = paris.distance_m(&london) / 1000.0;
        assert!((km - 344.0).abs() < 10.0);
        assert!((paris.distance_miles(&london) - 213.7).abs() < 7.0);
    }

    #[test]
    fn test_offset_and_bearing() {
        let start = Coordinates::new(41.0, -73.8).unwrap();
        let north = start.offset(0.0, 1000.0);
        assert!((start.distance_m(&north) - 1000.0).abs() < 5.0);
        assert!(start.bearing_to(&north) < 1.0 || start.bearing_to(&north) > 359.0);

        let east = start.offset(90.0, 1000.0);
        assert!((start.distance_m(&east) - 1000.0).abs() < 5.0);
        assert!((start.bearing_to(&east) - 90.0).abs() < 1.0);
    }
}
