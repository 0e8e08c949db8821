use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum MapsError {
    #[error("network error")]
    Network(#[from] reqwest::Error),
    #[error("json parse error")]
    JsonParse(reqwest::Error),
    #[error("maps api responded with http status {0}")]
    Http(StatusCode),
    #[error("maps api responded with status {0}")]
    Status(String),
    #[error("no results found for {0}")]
    NoResults(String),
    #[error("no route between the given points")]
    NoRoute,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlaceSuggestion {
    pub place_id: String,
    pub description: String,
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// returns the first location matching the address
    async fn geocode(&self, address: &str) -> Result<GeoPoint, MapsError>;

    /// address autocomplete
    async fn suggest(&self, input: &str) -> Result<Vec<PlaceSuggestion>, MapsError>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Directions: Send + Sync {
    /// returns the driving distance between the two points, in meters
    async fn distance_meters(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<f64, MapsError>;
}

pub struct GoogleMaps {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GoogleMaps {
    pub fn new(client: reqwest::Client, api_base: &str, api_key: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MapsError> {
        let res = self
            .client
            .get(format!("{}{path}", self.api_base))
            .query(&[("key", &self.api_key)])
            .query(query)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(MapsError::Http(res.status()));
        }

        res.json().await.map_err(MapsError::JsonParse)
    }
}

#[async_trait::async_trait]
impl Geocoder for GoogleMaps {
    #[tracing::instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<GeoPoint, MapsError> {
        let res: GeocodeResponse = self
            .get("/maps/api/geocode/json", &[("address", address.to_string())])
            .await?;

        first_location(address, res)
    }

    #[tracing::instrument(skip(self))]
    async fn suggest(&self, input: &str) -> Result<Vec<PlaceSuggestion>, MapsError> {
        let res: AutocompleteResponse = self
            .get(
                "/maps/api/place/autocomplete/json",
                &[("input", input.to_string())],
            )
            .await?;

        suggestions(res)
    }
}

#[async_trait::async_trait]
impl Directions for GoogleMaps {
    #[tracing::instrument(skip(self))]
    async fn distance_meters(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<f64, MapsError> {
        let res: DirectionsResponse = self
            .get(
                "/maps/api/directions/json",
                &[
                    ("origin", origin.to_query()),
                    ("destination", destination.to_query()),
                ],
            )
            .await?;

        route_distance(res)
    }
}

#[derive(Deserialize, Debug)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Deserialize, Debug)]
struct Geometry {
    location: GeoPoint,
}

#[derive(Deserialize, Debug)]
struct AutocompleteResponse {
    status: String,
    #[serde(default)]
    predictions: Vec<PlaceSuggestion>,
}

#[derive(Deserialize, Debug)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize, Debug)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
}

#[derive(Deserialize, Debug)]
struct DirectionsLeg {
    distance: TextValue,
}

#[derive(Deserialize, Debug)]
struct TextValue {
    value: f64,
}

fn first_location(address: &str, res: GeocodeResponse) -> Result<GeoPoint, MapsError> {
    match res.status.as_str() {
        "OK" | "ZERO_RESULTS" => {}
        _ => return Err(MapsError::Status(res.status)),
    }

    res.results
        .into_iter()
        .next()
        .map(|r| r.geometry.location)
        .ok_or_else(|| MapsError::NoResults(address.to_string()))
}

fn suggestions(res: AutocompleteResponse) -> Result<Vec<PlaceSuggestion>, MapsError> {
    match res.status.as_str() {
        "OK" | "ZERO_RESULTS" => Ok(res.predictions),
        _ => Err(MapsError::Status(res.status)),
    }
}

/// distance of the first route, in meters
fn route_distance(res: DirectionsResponse) -> Result<f64, MapsError> {
    match res.status.as_str() {
        "OK" | "ZERO_RESULTS" => {}
        _ => return Err(MapsError::Status(res.status)),
    }

    let route = res.routes.into_iter().next().ok_or(MapsError::NoRoute)?;
    if route.legs.is_empty() {
        return Err(MapsError::NoRoute);
    }

    Ok(route.legs.iter().map(|leg| leg.distance.value).sum())
}
