//! Domain types shared across the engine: listings as synced from the
//! backend feed, the raw wire records they are built from, and location
//! samples from the device's location provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geo::{self, Coordinates};

/// Food category of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Vegetables,
    Fruits,
    Bakery,
    Dairy,
    Prepared,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Vegetables => "vegetables",
            Category::Fruits => "fruits",
            Category::Bakery => "bakery",
            Category::Dairy => "dairy",
            Category::Prepared => "prepared",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Remaining quantity tier of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    High,
    Medium,
    Low,
}

impl Availability {
    /// Numeric tier used by the popularity score (High > Medium > Low).
    pub(crate) fn tier(&self) -> i32 {
        match self {
            Availability::High => 3,
            Availability::Medium => 2,
            Availability::Low => 1,
        }
    }
}

/// The provider who posted a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

/// Unvalidated coordinate pair as it arrives on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawLocation {
    pub lat: f64,
    pub lon: f64,
}

/// A listing record exactly as published by the backend feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListingRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub availability: Availability,
    pub location: RawLocation,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    pub expires_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub provider: Provider,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
}

/// A synced listing with derived fields, immutable within one sync tick.
///
/// The whole set is replaced wholesale on every backend update; consumers
/// never patch individual listings.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub availability: Availability,
    pub coordinates: Coordinates,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub provider: Provider,
    pub rating: Option<f64>,
    /// Distance from the caller's last known location, if one was supplied.
    pub distance_meters: Option<f64>,
    /// Time to expiry as of the sync tick. Negative once expired.
    pub time_left: Duration,
    /// Display string derived from `time_left`, never parsed back.
    pub time_left_label: String,
    /// True iff 0 < expires_at - now <= 2 hours.
    pub is_urgent: bool,
}

impl Listing {
    /// Build a listing from a raw feed record, computing the derived fields
    /// against `now` and an optional origin. Rejects malformed coordinates.
    pub fn from_record(
        record: RawListingRecord,
        origin: Option<&Coordinates>,
        now: DateTime<Utc>,
    ) -> Result<Self, GeometryError> {
        let coordinates = Coordinates::new(record.location.lat, record.location.lon)?;
        let time_left = record.expires_at - now;
        let is_urgent = time_left > Duration::zero() && time_left <= Duration::hours(2);
        let distance_meters = origin.map(|o| geo::distance_meters(o, &coordinates));
        Ok(Self {
            id: record.id,
            title: record.title,
            description: record.description,
            category: record.category,
            availability: record.availability,
            coordinates,
            created_at: record.created_at,
            expires_at: record.expires_at,
            provider: record.provider,
            rating: record.rating,
            distance_meters,
            time_left_label: geo::format_time_left(time_left),
            time_left,
            is_urgent,
        })
    }

    /// Remaining hours to expiry (fractional, negative once expired).
    pub fn hours_left(&self) -> f64 {
        self.time_left.num_seconds() as f64 / 3600.0
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.distance_meters.map(|m| m / 1000.0)
    }

    /// Display string for the distance, if one was computed.
    pub fn distance_label(&self) -> Option<String> {
        self.distance_meters.map(geo::format_distance)
    }
}

/// One sample from the device's location provider.
#[derive(Debug, Clone)]
pub struct LocationSample {
    pub coordinates: Coordinates,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            accuracy: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_in: Duration) -> RawListingRecord {
        let now = Utc::now();
        RawListingRecord {
            id: "l1".to_string(),
            title: "Sourdough loaves".to_string(),
            description: "Day-old bread".to_string(),
            category: Category::Bakery,
            availability: Availability::Medium,
            location: RawLocation {
                lat: 37.7749,
                lon: -122.4194,
            },
            images: vec![],
            quantity: Some(4),
            expires_at: now + expires_in,
            status: "active".to_string(),
            created_at: now - Duration::hours(1),
            provider: Provider {
                id: "p1".to_string(),
                name: "Corner Bakery".to_string(),
                avatar: None,
                verified: true,
            },
            rating: Some(4.5),
            review_count: Some(12),
        }
    }

    #[test]
    fn urgency_requires_expiry_within_two_hours() {
        let now = Utc::now();
        let soon = Listing::from_record(record(Duration::minutes(90)), None, now).unwrap();
        assert!(soon.is_urgent);

        let later = Listing::from_record(record(Duration::hours(5)), None, now).unwrap();
        assert!(!later.is_urgent);

        let expired = Listing::from_record(record(Duration::minutes(-10)), None, now).unwrap();
        assert!(!expired.is_urgent, "already-expired listings are not urgent");
        assert_eq!(expired.time_left_label, "Expired");
    }

    #[test]
    fn distance_is_computed_from_origin() {
        let now = Utc::now();
        let origin = Coordinates::new(37.7749, -122.4194).unwrap();
        let listing = Listing::from_record(record(Duration::hours(3)), Some(&origin), now).unwrap();
        assert_eq!(listing.distance_meters, Some(0.0));
        assert_eq!(listing.distance_label().as_deref(), Some("0m"));

        let without_origin = Listing::from_record(record(Duration::hours(3)), None, now).unwrap();
        assert!(without_origin.distance_meters.is_none());
    }

    #[test]
    fn malformed_coordinates_are_rejected() {
        let mut bad = record(Duration::hours(3));
        bad.location.lat = 120.0;
        let err = Listing::from_record(bad, None, Utc::now());
        assert!(matches!(err, Err(GeometryError::LatitudeOutOfRange(_))));
    }

    #[test]
    fn raw_record_deserializes_from_feed_json() {
        let json = serde_json::json!({
            "id": "abc",
            "title": "Apples",
            "description": "A crate of apples",
            "category": "fruits",
            "availability": "high",
            "location": {"lat": 37.0, "lon": -122.0},
            "images": [],
            "quantity": 10,
            "expiresAt": "2026-08-23T18:00:00Z",
            "status": "active",
            "createdAt": "2026-08-23T10:00:00Z",
            "provider": {"id": "p9", "name": "Orchard", "verified": false},
            "rating": 4.2
        });
        let record: RawListingRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.category, Category::Fruits);
        assert_eq!(record.availability, Availability::High);
        assert!(record.review_count.is_none());
    }
}
