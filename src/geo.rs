use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `lat,lng`, the format the directions api expects for origin/destination
    pub fn to_query(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// Cache key for a quote between two points.
///
/// Keys are directional: the key for `(a, b)` differs from the one for `(b, a)`,
/// since routes and fares can differ depending on the direction of travel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteQuoteKey(String);

impl RouteQuoteKey {
    pub fn new(pickup: &GeoPoint, drop: &GeoPoint) -> Self {
        Self(format!(
            "{},{}-{},{}",
            pickup.lat, pickup.lng, drop.lat, drop.lng
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteQuoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
