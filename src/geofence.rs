//! Geofencing: circular regions, transition detection and the polling
//! proximity monitor.
//!
//! The engine owns the active region set: the subset of registered
//! regions whose last containment evaluation was true. It is the sole
//! basis for detecting transitions: an enter event fires iff a region
//! moves from inactive to active between two consecutive evaluations,
//! symmetrically for exit. Region registration never synthesizes events;
//! a region added while the user is already inside it fires its enter on
//! the next evaluation.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::error::GeometryError;
use crate::geo::{self, Coordinates};
use crate::model::{Listing, LocationSample};

/// Bounded event history size.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default radius for regions derived from listings.
pub const DEFAULT_LISTING_RADIUS_METERS: f64 = 500.0;

/// A named circular geofence, optionally tied to a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    pub center: Coordinates,
    pub radius_meters: f64,
    pub notify_on_entry: bool,
    pub notify_on_exit: bool,
    /// Back-reference for regions derived 1:1 from a listing.
    pub listing_id: Option<String>,
}

impl Region {
    /// Create a region. The radius must be a positive, finite number of
    /// meters. Entry notification defaults on, exit notification off.
    pub fn new(id: &str, center: Coordinates, radius_meters: f64) -> Result<Self, GeometryError> {
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(GeometryError::InvalidRadius(radius_meters));
        }
        Ok(Self {
            id: id.to_string(),
            center,
            radius_meters,
            notify_on_entry: true,
            notify_on_exit: false,
            listing_id: None,
        })
    }

    /// Derive the 1:1 region for a listing, id `"food-" + listing id`.
    pub fn for_listing(listing: &Listing, radius_meters: f64) -> Result<Self, GeometryError> {
        let mut region = Self::new(
            &format!("food-{}", listing.id),
            listing.coordinates,
            radius_meters,
        )?;
        region.listing_id = Some(listing.id.clone());
        Ok(region)
    }

    pub fn with_entry_notification(mut self, notify: bool) -> Self {
        self.notify_on_entry = notify;
        self
    }

    pub fn with_exit_notification(mut self, notify: bool) -> Self {
        self.notify_on_exit = notify;
        self
    }

    /// Boundary-inclusive point-in-circle test.
    pub fn contains(&self, point: &Coordinates) -> bool {
        geo::distance_meters(point, &self.center) <= self.radius_meters
    }
}

/// Direction of a region transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Enter,
    Exit,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionKind::Enter => write!(f, "enter"),
            TransitionKind::Exit => write!(f, "exit"),
        }
    }
}

/// A region transition, carrying the triggering location sample and a
/// snapshot of the region at trigger time.
#[derive(Debug, Clone)]
pub struct GeofenceEvent {
    pub id: Uuid,
    pub region_id: String,
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
    pub location: LocationSample,
    pub region: Region,
}

impl GeofenceEvent {
    fn new(
        kind: TransitionKind,
        region: &Region,
        location: &LocationSample,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            region_id: region.id.clone(),
            kind,
            timestamp,
            location: location.clone(),
            region: region.clone(),
        }
    }
}

/// Transition detector over a set of registered regions.
///
/// All methods take `&mut self`; a caller sharing the engine across tasks
/// must serialize access (see [`ProximityMonitor`], which wraps it in a
/// mutex so location updates and timer ticks cannot interleave a
/// partially-updated active set).
pub struct GeofenceEngine {
    regions: Vec<Region>,
    active: HashSet<String>,
    history: VecDeque<GeofenceEvent>,
    history_capacity: usize,
    last_event: Option<GeofenceEvent>,
}

impl GeofenceEngine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(history_capacity: usize) -> Self {
        Self {
            regions: Vec::new(),
            active: HashSet::new(),
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            last_event: None,
        }
    }

    /// Register a region, replacing any existing region with the same id in
    /// place. Containment state carries over until the next evaluation, so
    /// re-registering a region the user is inside does not re-fire enter.
    pub fn add_region(&mut self, region: Region) {
        match self.regions.iter_mut().find(|r| r.id == region.id) {
            Some(existing) => {
                debug!("replacing region {}", region.id);
                *existing = region;
            }
            None => {
                debug!("registering region {} (r={}m)", region.id, region.radius_meters);
                self.regions.push(region);
            }
        }
    }

    /// Unregister a region. Returns whether it was present. Takes effect on
    /// the next `check_proximity` call; no exit event is synthesized.
    pub fn remove_region(&mut self, id: &str) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r.id != id);
        self.active.remove(id);
        before != self.regions.len()
    }

    /// Unregister all regions and clear the active set. The event history
    /// is retained.
    pub fn clear_regions(&mut self) {
        info!("clearing {} regions", self.regions.len());
        self.regions.clear();
        self.active.clear();
    }

    /// Derive 1:1 regions from the synced listing set: add or refresh a
    /// region per listing and drop derived regions whose listing
    /// disappeared. Explicitly registered regions are untouched.
    pub fn sync_listing_regions(
        &mut self,
        listings: &[Listing],
        radius_meters: f64,
    ) -> Result<(), GeometryError> {
        let keep: HashSet<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        let before = self.regions.len();
        self.regions.retain(|r| match &r.listing_id {
            Some(listing_id) => keep.contains(listing_id.as_str()),
            None => true,
        });
        let dropped = before - self.regions.len();
        if dropped > 0 {
            debug!("dropped {} regions for vanished listings", dropped);
        }
        for listing in listings {
            self.add_region(Region::for_listing(listing, radius_meters)?);
        }
        let ids: HashSet<&str> = self.regions.iter().map(|r| r.id.as_str()).collect();
        self.active.retain(|id| ids.contains(id.as_str()));
        Ok(())
    }

    /// Evaluate a location sample against every registered region, emit
    /// events for transitions and swap in the new active set, atomically
    /// relative to this call.
    pub fn check_proximity(&mut self, location: &LocationSample) -> Vec<GeofenceEvent> {
        let now = Utc::now();
        let mut next_active = HashSet::with_capacity(self.regions.len());
        let mut events = Vec::new();

        for region in &self.regions {
            let inside = region.contains(&location.coordinates);
            if inside {
                next_active.insert(region.id.clone());
            }
            let was_inside = self.active.contains(&region.id);
            if inside && !was_inside {
                if region.notify_on_entry {
                    events.push(GeofenceEvent::new(TransitionKind::Enter, region, location, now));
                }
            } else if !inside && was_inside && region.notify_on_exit {
                events.push(GeofenceEvent::new(TransitionKind::Exit, region, location, now));
            }
        }

        self.active = next_active;
        for event in &events {
            debug!("geofence {}: region {}", event.kind, event.region_id);
            while self.history.len() >= self.history_capacity.max(1) {
                self.history.pop_front();
            }
            self.history.push_back(event.clone());
            self.last_event = Some(event.clone());
        }
        events
    }

    /// Regions within `max_distance_meters` of a point, sorted ascending by
    /// distance; ties keep registration order.
    pub fn nearby_regions(
        &self,
        location: &Coordinates,
        max_distance_meters: f64,
    ) -> Vec<Region> {
        let mut within: Vec<(f64, &Region)> = self
            .regions
            .iter()
            .map(|r| (geo::distance_meters(location, &r.center), r))
            .filter(|(d, _)| *d <= max_distance_meters)
            .collect();
        within.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        within.into_iter().map(|(_, r)| r.clone()).collect()
    }

    /// Ids of regions the user was inside as of the last evaluation.
    pub fn active_region_ids(&self) -> Vec<String> {
        self.regions
            .iter()
            .filter(|r| self.active.contains(&r.id))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn history(&self) -> impl Iterator<Item = &GeofenceEvent> {
        self.history.iter()
    }

    pub fn last_event(&self) -> Option<&GeofenceEvent> {
        self.last_event.as_ref()
    }
}

impl Default for GeofenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for the polling proximity monitor.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Interval at which `check_proximity` re-runs even without a fresh
    /// location sample, to tolerate an irregular location provider.
    pub poll_interval: std::time::Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(5),
        }
    }
}

/// Polling driver around a shared [`GeofenceEngine`].
///
/// Location updates and the fixed-interval timer both run
/// `check_proximity` under one mutex, so each evaluation is a single
/// atomic step. Interval polling stands in for OS-level region
/// monitoring, which this engine does not integrate.
pub struct ProximityMonitor {
    engine: Arc<Mutex<GeofenceEngine>>,
    options: MonitorOptions,
    location_tx: watch::Sender<Option<LocationSample>>,
    events_tx: broadcast::Sender<GeofenceEvent>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ProximityMonitor {
    pub fn new(engine: Arc<Mutex<GeofenceEngine>>) -> Self {
        Self::with_options(engine, MonitorOptions::default())
    }

    pub fn with_options(engine: Arc<Mutex<GeofenceEngine>>, options: MonitorOptions) -> Self {
        let (location_tx, _) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(64);
        Self {
            engine,
            options,
            location_tx,
            events_tx,
            task: std::sync::Mutex::new(None),
        }
    }

    /// Handle to the shared engine, for region registration.
    pub fn engine(&self) -> Arc<Mutex<GeofenceEngine>> {
        self.engine.clone()
    }

    /// Receiver for emitted geofence events.
    pub fn on_event(&self) -> broadcast::Receiver<GeofenceEvent> {
        self.events_tx.subscribe()
    }

    /// Feed the latest location sample. Triggers an immediate evaluation in
    /// the running monitor task.
    pub fn update_location(&self, sample: LocationSample) {
        self.location_tx.send_replace(Some(sample));
    }

    /// Spawn the polling task, tearing down a previously running one first.
    pub fn start(&self) {
        self.stop();
        let engine = self.engine.clone();
        let events_tx = self.events_tx.clone();
        let mut location_rx = self.location_tx.subscribe();
        let poll_interval = self.options.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("proximity monitor started (poll every {:?})", poll_interval);
            loop {
                tokio::select! {
                    changed = location_rx.changed() => {
                        if changed.is_err() {
                            debug!("location channel closed, proximity monitor exiting");
                            break;
                        }
                    }
                    _ = ticker.tick() => {}
                }
                let sample = location_rx.borrow().clone();
                let Some(sample) = sample else { continue };
                let events = engine.lock().await.check_proximity(&sample);
                for event in events {
                    if let Err(e) = events_tx.send(event) {
                        // No receivers; keep evaluating, history still records
                        warn!("geofence event dropped: {}", e);
                    }
                }
            }
        });
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(handle);
        }
    }

    /// Tear the polling task down. Synchronous and unconditional; an
    /// evaluation already in flight may still complete.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.task.lock() {
            if let Some(handle) = slot.take() {
                info!("proximity monitor stopped");
                handle.abort();
            }
        }
    }
}

impl Drop for ProximityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
