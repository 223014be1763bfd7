//! Pure filter/sort pipeline over a synced listing set.
//!
//! `apply` narrows in a fixed order (text search, facet filters, advanced
//! filters) and finishes with a stable sort, so identical inputs always
//! produce an identically ordered output.

use std::cmp::Ordering;

use crate::model::{Availability, Category, Listing};

/// Sort key for the final ordering step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Nearer first. Listings without a computed distance sort last.
    Distance,
    /// Fewer remaining hours first, a proxy for recency.
    Newest,
    /// Derived score (availability tier plus urgency bonus), descending.
    Popularity,
    /// Derived freshness score, descending.
    Freshness,
}

/// Sort direction; `Descending` inverts the comparator uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One active facet toggle, identified for the UI and carrying its
/// filtering semantics.
#[derive(Debug, Clone)]
pub struct FacetFilter {
    pub id: String,
    pub kind: FacetKind,
}

impl FacetFilter {
    pub fn new(id: &str, kind: FacetKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
        }
    }
}

/// Declared semantics of a facet filter.
#[derive(Debug, Clone)]
pub enum FacetKind {
    /// Exact category match.
    Category(Category),
    /// High availability only.
    AvailableNow,
    /// Pickup still possible today: expires within 24 hours.
    PickupToday,
    /// Urgent listings, or the "organic" heuristic over title/description.
    Special,
    /// Distance threshold in kilometers. Listings without a distance drop.
    WithinKm(f64),
    /// Expires within 12 hours.
    FreshToday,
}

/// Advanced filter block of the filter state.
#[derive(Debug, Clone)]
pub struct AdvancedFilters {
    pub max_distance_km: f64,
    /// Allow-set of availability tiers.
    pub availability_status: Vec<Availability>,
    pub urgent_only: bool,
    /// Upper bound on remaining hours to expiry.
    pub max_age_hours: f64,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl Default for AdvancedFilters {
    fn default() -> Self {
        Self {
            max_distance_km: 10.0,
            availability_status: vec![Availability::High, Availability::Medium, Availability::Low],
            urgent_only: false,
            max_age_hours: 24.0,
            sort_by: SortBy::Distance,
            sort_order: SortOrder::Ascending,
        }
    }
}

/// Complete filter state, owned by the caller; pure input to [`apply`].
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub search: Option<String>,
    pub facets: Vec<FacetFilter>,
    pub advanced: AdvancedFilters,
}

/// Transform a listing set into an ordered, filtered set.
///
/// Referentially transparent: a stable sort breaks ties by input order, so
/// `apply(apply(l, f), f) == apply(l, f)`.
pub fn apply(listings: &[Listing], state: &FilterState) -> Vec<Listing> {
    let mut result: Vec<Listing> = listings.to_vec();

    if let Some(query) = &state.search {
        let needle = query.trim().to_lowercase();
        if !needle.is_empty() {
            result.retain(|l| {
                l.title.to_lowercase().contains(&needle) || l.category.as_str().contains(&needle)
            });
        }
    }

    for facet in &state.facets {
        result.retain(|l| facet_matches(l, &facet.kind));
    }

    let advanced = &state.advanced;
    result.retain(|l| {
        l.distance_km()
            .map(|d| d <= advanced.max_distance_km)
            .unwrap_or(true)
    });
    result.retain(|l| advanced.availability_status.contains(&l.availability));
    if advanced.urgent_only {
        result.retain(|l| l.is_urgent);
    }
    result.retain(|l| l.hours_left() <= advanced.max_age_hours);

    sort_listings(&mut result, advanced.sort_by, advanced.sort_order);
    result
}

fn facet_matches(listing: &Listing, kind: &FacetKind) -> bool {
    match kind {
        FacetKind::Category(category) => listing.category == *category,
        FacetKind::AvailableNow => listing.availability == Availability::High,
        FacetKind::PickupToday => {
            listing.hours_left() > 0.0 && listing.hours_left() <= 24.0
        }
        FacetKind::Special => {
            listing.is_urgent
                || listing.title.to_lowercase().contains("organic")
                || listing.description.to_lowercase().contains("organic")
        }
        FacetKind::WithinKm(km) => listing.distance_km().map(|d| d <= *km).unwrap_or(false),
        FacetKind::FreshToday => listing.hours_left() > 0.0 && listing.hours_left() <= 12.0,
    }
}

fn sort_listings(listings: &mut [Listing], sort_by: SortBy, order: SortOrder) {
    listings.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::Distance => cmp_optional(a.distance_meters, b.distance_meters),
            SortBy::Newest => cmp_f64(a.hours_left(), b.hours_left()),
            SortBy::Popularity => cmp_f64(popularity_score(b), popularity_score(a)),
            SortBy::Freshness => cmp_f64(freshness_score(b), freshness_score(a)),
        };
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

/// Availability tier plus a bonus for urgency.
pub(crate) fn popularity_score(listing: &Listing) -> f64 {
    listing.availability.tier() as f64 + if listing.is_urgent { 2.0 } else { 0.0 }
}

/// Remaining hours to expiry, capped at a day.
pub(crate) fn freshness_score(listing: &Listing) -> f64 {
    listing.hours_left().clamp(0.0, 24.0)
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn cmp_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp_f64(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
