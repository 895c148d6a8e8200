//! User location attached to check requests.
//!
//! The backend uses coordinates to rank nearby municipalities first. A reading
//! is resolved lazily on the first check and reused for the rest of the
//! session; a missing reading is never cached so a later check can retry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Source of the current location.
pub trait LocationProvider: Send + Sync {
    /// Returns the current location, or `None` when it is unknown or not permitted.
    fn locate(&self) -> Option<Coordinates>;
}

/// Location taken from configuration (`USER_LATITUDE` / `USER_LONGITUDE`).
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLocation {
    coordinates: Option<Coordinates>,
}

impl ConfiguredLocation {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self { coordinates }
    }
}

impl LocationProvider for ConfiguredLocation {
    fn locate(&self) -> Option<Coordinates> {
        self.coordinates
    }
}

/// Session-scoped location cache owned by the check orchestrator.
pub struct LocationCache {
    provider: Box<dyn LocationProvider>,
    cached: Option<Coordinates>,
}

impl LocationCache {
    pub fn new(provider: impl LocationProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            cached: None,
        }
    }

    /// Returns the cached reading, asking the provider only until it succeeds once.
    pub fn get(&mut self) -> Option<Coordinates> {
        if self.cached.is_none() {
            self.cached = self.provider.locate();
            if let Some(coords) = self.cached {
                tracing::debug!(
                    latitude = coords.latitude,
                    longitude = coords.longitude,
                    "Location resolved"
                );
            }
        }
        self.cached
    }
}
