//! Real-time listing synchronization.
//!
//! `ListingSync` owns one subscription against the backend feed at a time.
//! Every raw update is converted into domain [`Listing`] values (distance
//! from the caller's origin, time-to-expiry, urgency), narrowed by the
//! current viewport, distance cap and free-text search, and then published
//! wholesale on a watch channel. Consumers replace their previous view,
//! they never patch it.
//!
//! Changing the query descriptor or the viewport tears the old feed
//! subscription down before establishing a new one. Feed errors are
//! forwarded verbatim on the error channel; no automatic retry is
//! performed. Call [`ListingSync::refresh`] to resubscribe.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::{broadcast, watch, Mutex};

use crate::error::EngineError;
use crate::geo::{Coordinates, Viewport};
use crate::model::{Availability, Category, Listing, RawListingRecord};

/// Filter descriptor handed to the backend feed when subscribing.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    /// Only records with this status are streamed.
    pub status_equals: String,
    pub category_in: Option<Vec<Category>>,
    pub availability_in: Option<Vec<Availability>>,
    /// Freshness ordering: newest records first.
    pub newest_first: bool,
    /// Result cap applied by the backend.
    pub limit: usize,
    /// Client-side distance cap in kilometers, applied after conversion.
    pub max_distance_km: Option<f64>,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            status_equals: "active".to_string(),
            category_in: None,
            availability_in: None,
            newest_first: true,
            limit: 50,
            max_distance_km: None,
        }
    }
}

impl ListingQuery {
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.category_in = Some(categories);
        self
    }

    pub fn with_availability(mut self, availability: Vec<Availability>) -> Self {
        self.availability_in = Some(availability);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_distance_km(mut self, km: f64) -> Self {
        self.max_distance_km = Some(km);
        self
    }
}

/// Single observer seam for feed updates: one callback receiving either a
/// full batch of raw records or the stream error, never both.
pub type FeedObserver = Box<dyn Fn(Result<Vec<RawListingRecord>, EngineError>) + Send + Sync>;

/// Handle for an active feed subscription.
///
/// Cancellation is synchronous and unconditional; at most one stale
/// callback may still arrive after teardown is initiated (accepted race).
/// Dropping the handle cancels it.
pub struct FeedSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl FeedSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// The backend real-time query service, treated as opaque.
#[async_trait]
pub trait ListingFeed: Send + Sync {
    /// Establish a live stream for `query`. The observer is invoked on every
    /// remote change with the full current result set.
    async fn subscribe(
        &self,
        query: &ListingQuery,
        observer: FeedObserver,
    ) -> Result<FeedSubscription, EngineError>;
}

/// State read by the feed observer on every update. Lives behind an `Arc`
/// so a stale callback after teardown still sees a consistent snapshot.
struct SyncShared {
    viewport: RwLock<Option<Viewport>>,
    origin: RwLock<Option<Coordinates>>,
    search: RwLock<Option<String>>,
    listings_tx: watch::Sender<Vec<Listing>>,
    errors_tx: broadcast::Sender<String>,
}

impl SyncShared {
    fn handle_event(
        &self,
        event: Result<Vec<RawListingRecord>, EngineError>,
        max_distance_km: Option<f64>,
    ) {
        match event {
            Ok(records) => {
                let now = Utc::now();
                let origin = *read_lock(&self.origin);
                let viewport = *read_lock(&self.viewport);
                let search = read_lock(&self.search).clone();

                let total = records.len();
                let mut listings = Vec::with_capacity(total);
                for record in records {
                    match Listing::from_record(record, origin.as_ref(), now) {
                        Ok(listing) => listings.push(listing),
                        Err(e) => warn!("dropping listing with malformed coordinates: {}", e),
                    }
                }
                if let Some(vp) = &viewport {
                    listings.retain(|l| vp.contains(&l.coordinates));
                }
                if let Some(max_km) = max_distance_km {
                    // Listings without a computed distance pass; distance is
                    // unknowable until the caller supplies an origin.
                    listings.retain(|l| l.distance_km().map(|d| d <= max_km).unwrap_or(true));
                }
                if let Some(query) = &search {
                    let needle = query.to_lowercase();
                    listings.retain(|l| matches_search(l, &needle));
                }
                debug!("feed update: {} records -> {} listings", total, listings.len());
                self.listings_tx.send_replace(listings);
            }
            Err(e) => {
                warn!("listing feed error: {}", e);
                // Errors cross the broadcast channel as display strings
                let _ = self.errors_tx.send(e.to_string());
            }
        }
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Case-insensitive substring match over title, description, provider name
/// and category.
fn matches_search(listing: &Listing, needle: &str) -> bool {
    listing.title.to_lowercase().contains(needle)
        || listing.description.to_lowercase().contains(needle)
        || listing.provider.name.to_lowercase().contains(needle)
        || listing.category.as_str().contains(needle)
}

/// Continuously synced view of available listings.
pub struct ListingSync {
    feed: Arc<dyn ListingFeed>,
    query: RwLock<ListingQuery>,
    shared: Arc<SyncShared>,
    subscription: Mutex<Option<FeedSubscription>>,
}

impl ListingSync {
    pub fn new(feed: Arc<dyn ListingFeed>, query: ListingQuery) -> Self {
        let (listings_tx, _) = watch::channel(Vec::new());
        let (errors_tx, _) = broadcast::channel(16);
        Self {
            feed,
            query: RwLock::new(query),
            shared: Arc::new(SyncShared {
                viewport: RwLock::new(None),
                origin: RwLock::new(None),
                search: RwLock::new(None),
                listings_tx,
                errors_tx,
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Establish the feed subscription, tearing down any previous one first.
    pub async fn subscribe(&self) -> Result<(), EngineError> {
        let mut slot = self.subscription.lock().await;
        if let Some(old) = slot.take() {
            debug!("tearing down previous feed subscription");
            old.cancel();
        }
        let query = self.read_query();
        let max_distance_km = query.max_distance_km;
        let shared = self.shared.clone();
        let observer: FeedObserver = Box::new(move |event| shared.handle_event(event, max_distance_km));
        let subscription = self.feed.subscribe(&query, observer).await?;
        info!(
            "subscribed to listing feed (status={}, limit={})",
            query.status_equals, query.limit
        );
        *slot = Some(subscription);
        Ok(())
    }

    /// Replace the query descriptor. Requires a full resubscribe; there is
    /// no incremental re-query.
    pub async fn set_query(&self, query: ListingQuery) -> Result<(), EngineError> {
        *write_lock(&self.query) = query;
        self.subscribe().await
    }

    /// Replace the viewport and resubscribe. `None` removes viewport
    /// narrowing entirely.
    pub async fn set_viewport(&self, viewport: Option<Viewport>) -> Result<(), EngineError> {
        *write_lock(&self.shared.viewport) = viewport;
        self.subscribe().await
    }

    /// Update the caller's last known location. Takes effect on the next
    /// feed update; no resubscribe needed, distance is derived client-side.
    pub fn set_origin(&self, origin: Option<Coordinates>) {
        *write_lock(&self.shared.origin) = origin;
    }

    /// Set the free-text search. Queries of a single character are rejected
    /// before any backend interaction; empty or `None` clears the search.
    pub fn set_search(&self, search: Option<String>) -> Result<(), EngineError> {
        let normalized = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(query) = &normalized {
            if query.chars().count() < 2 {
                return Err(EngineError::validation(
                    "search query must be at least 2 characters",
                ));
            }
        }
        *write_lock(&self.shared.search) = normalized;
        Ok(())
    }

    /// Resubscribe after a subscription error. Identical to `subscribe`;
    /// exposed under the name callers reach for on the error path.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        self.subscribe().await
    }

    /// Tear the feed subscription down. Idempotent.
    pub async fn unsubscribe(&self) {
        if let Some(old) = self.subscription.lock().await.take() {
            info!("unsubscribing from listing feed");
            old.cancel();
        }
    }

    /// Receiver for the live listing set. The borrowed value is always the
    /// complete current view.
    pub fn listings(&self) -> watch::Receiver<Vec<Listing>> {
        self.shared.listings_tx.subscribe()
    }

    /// Snapshot of the current listing set.
    pub fn current_listings(&self) -> Vec<Listing> {
        self.shared.listings_tx.borrow().clone()
    }

    /// Receiver for feed errors, forwarded verbatim as display strings.
    pub fn on_error(&self) -> broadcast::Receiver<String> {
        self.shared.errors_tx.subscribe()
    }

    fn read_query(&self) -> ListingQuery {
        read_lock(&self.query).clone()
    }
}
