//! Error handling for the discovery and alerting engine

use thiserror::Error;

/// Errors raised at the geometry input boundary.
///
/// Malformed coordinates are rejected outright, never clamped.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("coordinate is not a finite number")]
    NotFinite,

    #[error("region radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),

    #[error("viewport bounds are inverted or out of range")]
    InvalidViewport,
}

/// Unified error type for the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Backend stream failure. Surfaced to the caller verbatim; no automatic
    /// retry is performed. Resubscribe with `ListingSync::refresh`.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Input rejected before any backend interaction, with a user-facing
    /// message (e.g. a one-character search query).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn subscription<T: std::fmt::Display>(msg: T) -> Self {
        EngineError::Subscription(msg.to_string())
    }

    pub fn validation<T: std::fmt::Display>(msg: T) -> Self {
        EngineError::Validation(msg.to_string())
    }
}
