use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{backend::BackendError, geo::GeoPoint, quote::RouteQuote};

pub const DEFAULT_DRIVER_PLACEHOLDER: &str = "Available Driver";

/// Minutes of travel assumed per kilometer when the backend gives no eta
const MINUTES_PER_KM: f64 = 3.0;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("pickup and drop addresses are required")]
    MissingAddress,
    #[error("failed to confirm ride: {0}")]
    Backend(#[from] BackendError),
}

/// Body of `POST /book-ride`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub pickup: String,
    pub drop: String,
    pub pickup_coords: GeoPoint,
    pub drop_coords: GeoPoint,
    #[serde(rename = "distance")]
    pub distance_km: f64,
    pub fare: f64,
    pub surge_multiplier: f64,
}

impl BookingRequest {
    pub fn new(
        pickup: impl Into<String>,
        drop: impl Into<String>,
        pickup_coords: GeoPoint,
        drop_coords: GeoPoint,
        quote: &RouteQuote,
    ) -> Self {
        Self {
            pickup: pickup.into(),
            drop: drop.into(),
            pickup_coords,
            drop_coords,
            distance_km: quote.distance_km,
            fare: quote.fare,
            surge_multiplier: quote.surge_multiplier,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), BookingError> {
        if self.pickup.trim().is_empty() || self.drop.trim().is_empty() {
            return Err(BookingError::MissingAddress);
        }
        Ok(())
    }
}

#[derive(Deserialize, Default, Clone, Debug, PartialEq)]
pub struct BookingResponse {
    #[serde(default)]
    pub driver: Option<AssignedDriver>,
    #[serde(default)]
    pub eta: Option<f64>,
}

#[derive(Deserialize, Default, Clone, Debug, PartialEq)]
pub struct AssignedDriver {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingResult {
    pub driver_name: String,
    pub eta_minutes: u32,
}

impl BookingResult {
    /// Fills in whatever the backend left out: the driver name falls back to
    /// `placeholder` and the eta to three minutes per kilometer.
    pub fn from_response(response: BookingResponse, distance_km: f64, placeholder: &str) -> Self {
        let driver_name = response
            .driver
            .and_then(|d| d.name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| placeholder.to_string());

        let eta = response
            .eta
            .unwrap_or_else(|| distance_km * MINUTES_PER_KM);

        Self {
            driver_name,
            eta_minutes: eta.round().max(0.0) as u32,
        }
    }
}
