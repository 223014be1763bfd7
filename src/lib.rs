//! Proximity-aware listing discovery and alerting engine for a local
//! surplus food sharing app.
//!
//! This crate covers the one subsystem of the app with real invariants:
//! keeping a live, geographically- and user-filtered view of available
//! listings in sync with a backend feed, and tracking a moving user's
//! entry/exit across circular regions tied to those listings.
//!
//! # Features
//!
//! - Real-time listing synchronization against an injected backend feed
//!   (`ListingSync`), publishing a wholesale-replaced listing set
//! - A pure filter/sort pipeline over the synced set (`filter::apply`)
//! - A geofence engine emitting enter/exit events on state transitions
//!   only, with a bounded event history (`GeofenceEngine`), plus a
//!   polling driver (`ProximityMonitor`)
//! - A preference gate between events and alert dispatch
//!   (`notify::should_deliver`), failing closed
//!
//! Screen rendering, authentication, image handling and push-token
//! registration are external collaborators and live outside this crate.

mod error;
pub mod filter;
pub mod geo;
mod geofence;
mod model;
pub mod notify;
mod sync;

pub use error::{EngineError, GeometryError};
pub use filter::{AdvancedFilters, FacetFilter, FacetKind, FilterState, SortBy, SortOrder};
pub use geo::{Coordinates, Viewport};
pub use geofence::{
    GeofenceEngine, GeofenceEvent, MonitorOptions, ProximityMonitor, Region, TransitionKind,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_LISTING_RADIUS_METERS,
};
pub use model::{
    Availability, Category, Listing, LocationSample, Provider, RawListingRecord, RawLocation,
};
pub use notify::{NotificationKind, NotificationPreferences, QuietHours};
pub use sync::{FeedObserver, FeedSubscription, ListingFeed, ListingQuery, ListingSync};
