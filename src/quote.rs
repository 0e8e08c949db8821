use std::{sync::Arc, time::SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{backend::BackendError, maps::MapsError};

#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("could not calculate route distance: {0}")]
    Distance(#[source] MapsError),
    #[error("could not fetch surge multiplier: {0}")]
    Surge(#[source] BackendError),
    #[error("could not calculate fare: {0}")]
    Fare(#[source] BackendError),
    #[error("{0}")]
    Arced(#[from] Arc<Self>),
}

impl QuoteError {
    /// the error as produced by the computation, looking through shared copies
    pub fn root(&self) -> &Self {
        match self {
            Self::Arced(inner) => inner.root(),
            other => other,
        }
    }
}

/// Distance, fare and surge for one pickup/drop pair.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuote {
    pub distance_km: f64,
    pub fare: f64,
    pub surge_multiplier: f64,
    pub computed_at: SystemTime,
}

impl RouteQuote {
    pub fn new(distance_km: f64, fare: f64, surge_multiplier: f64) -> Self {
        Self {
            distance_km,
            fare,
            surge_multiplier,
            computed_at: SystemTime::now(),
        }
    }

    pub fn is_peak(&self) -> bool {
        self.surge_multiplier > 1.0
    }
}

/// meters to kilometers, rounded to two decimal places
pub fn meters_to_km(meters: f64) -> f64 {
    // dividing by 10 first keeps half-way values like 12345 m exact
    (meters / 10.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_to_km() {
        assert_eq!(meters_to_km(12345.0), 12.35);
        assert_eq!(meters_to_km(12344.0), 12.34);
        assert_eq!(meters_to_km(999.0), 1.0);
        assert_eq!(meters_to_km(0.0), 0.0);
    }

    #[test]
    fn test_is_peak() {
        assert!(RouteQuote::new(1.0, 10.0, 1.5).is_peak());
        assert!(!RouteQuote::new(1.0, 10.0, 1.0).is_peak());
    }

    #[test]
    fn test_root_looks_through_arcs() {
        let err = QuoteError::Arced(Arc::new(QuoteError::Distance(MapsError::NoRoute)));

        assert!(matches!(err.root(), QuoteError::Distance(MapsError::NoRoute)));
        assert_eq!(
            err.to_string(),
            "could not calculate route distance: no route between the given points"
        );
    }
}
