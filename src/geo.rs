//! Spherical geometry primitives: great-circle distance, point-in-circle
//! tests and viewport containment, plus the display formatting helpers for
//! distances and time-to-expiry.
//!
//! Numeric values (meters, durations) are first-class here; formatted
//! strings are derived from them and never parsed back.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Mean Earth radius in meters, for the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A validated WGS84 coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair, rejecting out-of-range or non-finite input.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeometryError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeometryError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeometryError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeometryError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Great-circle distance in meters between two points (haversine formula on
/// a spherical Earth). Symmetric, non-negative, zero iff the inputs are equal.
pub fn distance_meters(a: &Coordinates, b: &Coordinates) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 near antipodal points; the asin
    // form would go NaN there, the atan2 form stays finite
    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).max(0.0).sqrt())
}

/// A rectangular lat/lon bounding box with inclusive bounds.
///
/// No anti-meridian wraparound support: a viewport whose west bound is
/// greater than its east bound is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Viewport {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, GeometryError> {
        // Validate corners through the coordinate constructor
        Coordinates::new(north, east)?;
        Coordinates::new(south, west)?;
        if north < south || east < west {
            return Err(GeometryError::InvalidViewport);
        }
        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// True iff the point falls within the inclusive bounds.
    pub fn contains(&self, point: &Coordinates) -> bool {
        point.latitude <= self.north
            && point.latitude >= self.south
            && point.longitude <= self.east
            && point.longitude >= self.west
    }
}

/// Format a distance for display: "650m" below one kilometer, "2.1km" above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Format a time-to-expiry for display ("45 min", "2 hours", "3 days").
/// Non-positive durations render as "Expired".
pub fn format_time_left(time_left: chrono::Duration) -> String {
    if time_left <= chrono::Duration::zero() {
        return "Expired".to_string();
    }
    let minutes = time_left.num_minutes();
    if minutes < 60 {
        return format!("{} min", minutes.max(1));
    }
    let hours = time_left.num_hours();
    if hours < 24 {
        return if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{} hours", hours)
        };
    }
    let days = time_left.num_days();
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    #[test]
    fn distance_is_zero_for_identical_points() {
        let a = coord(37.7749, -122.4194);
        assert_eq!(distance_meters(&a, &a), 0.0);
        let origin = coord(0.0, 0.0);
        assert_eq!(distance_meters(&origin, &origin), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = coord(37.7749, -122.4194);
        let b = coord(40.7128, -74.0060);
        assert_eq!(distance_meters(&a, &b), distance_meters(&b, &a));
    }

    #[test]
    fn distance_matches_known_value() {
        // One degree of latitude at the equator is ~111.2 km
        let a = coord(0.0, 0.0);
        let b = coord(1.0, 0.0);
        let d = distance_meters(&a, &b);
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn distance_stays_finite_for_near_antipodal_points() {
        // Rounding makes the haversine term exceed 1.0 for this pair
        let a = coord(61.89854752150677, 97.0020683850554);
        let b = coord(-61.89854752141772, -82.99793161523544);
        let d = distance_meters(&a, &b);
        assert!(d.is_finite(), "got {}", d);
        assert!(d >= 0.0);
        // Essentially antipodal: half the Earth's circumference
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!((d - half_circumference).abs() < 10_000.0, "got {}", d);
    }

    #[test]
    fn coordinates_reject_out_of_range_input() {
        assert!(matches!(
            Coordinates::new(91.0, 0.0),
            Err(GeometryError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            Coordinates::new(0.0, -180.5),
            Err(GeometryError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            Coordinates::new(f64::NAN, 0.0),
            Err(GeometryError::NotFinite)
        ));
    }

    #[test]
    fn viewport_contains_is_inclusive() {
        let vp = Viewport::new(38.0, 37.0, -122.0, -123.0).unwrap();
        assert!(vp.contains(&coord(37.5, -122.5)));
        assert!(vp.contains(&coord(38.0, -122.0)), "north-east corner is inclusive");
        assert!(vp.contains(&coord(37.0, -123.0)), "south-west corner is inclusive");
        assert!(!vp.contains(&coord(38.1, -122.5)));
        assert!(!vp.contains(&coord(37.5, -121.9)));
    }

    #[test]
    fn viewport_rejects_inverted_bounds() {
        assert!(matches!(
            Viewport::new(37.0, 38.0, -122.0, -123.0),
            Err(GeometryError::InvalidViewport)
        ));
    }

    #[test]
    fn distance_formatting() {
        assert_eq!(format_distance(650.0), "650m");
        assert_eq!(format_distance(999.4), "999m");
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(2140.0), "2.1km");
    }

    #[test]
    fn time_left_formatting() {
        assert_eq!(format_time_left(chrono::Duration::minutes(-5)), "Expired");
        assert_eq!(format_time_left(chrono::Duration::minutes(45)), "45 min");
        assert_eq!(format_time_left(chrono::Duration::hours(1)), "1 hour");
        assert_eq!(format_time_left(chrono::Duration::hours(2)), "2 hours");
        assert_eq!(format_time_left(chrono::Duration::days(3)), "3 days");
    }
}
