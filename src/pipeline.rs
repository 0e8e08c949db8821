use std::sync::Arc;

use thiserror::Error;

use crate::{
    backend::{Bookings, Pricing},
    booking::{BookingError, BookingRequest, BookingResult},
    cache::{quote_cache, CacheSettings, QuoteCache},
    geo::{GeoPoint, RouteQuoteKey},
    maps::{Directions, Geocoder, MapsError, PlaceSuggestion},
    quote::{meters_to_km, QuoteError, RouteQuote},
};

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("address is empty")]
    EmptyAddress,
    #[error("failed to get location details for {address}: {source}")]
    Lookup { address: String, source: MapsError },
    #[error("failed to get address suggestions: {0}")]
    Suggestions(#[source] MapsError),
}

/// The external services a pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub geocoder: Arc<dyn Geocoder>,
    pub directions: Arc<dyn Directions>,
    pub pricing: Arc<dyn Pricing>,
    pub bookings: Arc<dyn Bookings>,
}

/// Turns addresses into quotes and quotes into bookings.
///
/// Each pipeline owns its quote cache, so quotes live as long as the pipeline does.
pub struct QuotePipeline {
    collaborators: Collaborators,
    cache: QuoteCache,
    driver_placeholder: String,
}

impl QuotePipeline {
    pub fn new(
        collaborators: Collaborators,
        cache_settings: &CacheSettings,
        driver_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            collaborators,
            cache: quote_cache(cache_settings),
            driver_placeholder: driver_placeholder.into(),
        }
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    #[tracing::instrument(skip(self))]
    pub async fn suggest_addresses(
        &self,
        input: &str,
    ) -> Result<Vec<PlaceSuggestion>, GeocodeError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(vec![]);
        }

        self.collaborators
            .geocoder
            .suggest(input)
            .await
            .map_err(GeocodeError::Suggestions)
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve_address(&self, text: &str) -> Result<GeoPoint, GeocodeError> {
        let address = text.trim();
        if address.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }

        self.collaborators
            .geocoder
            .geocode(address)
            .await
            .map_err(|source| GeocodeError::Lookup {
                address: address.to_string(),
                source,
            })
    }

    /// Returns the cached quote for this pickup/drop pair, computing it on a miss.
    #[tracing::instrument(skip(self))]
    pub async fn get_quote(
        &self,
        pickup: GeoPoint,
        drop: GeoPoint,
    ) -> Result<RouteQuote, QuoteError> {
        let key = RouteQuoteKey::new(&pickup, &drop);

        if let Some(quote) = self.cache.get(&key).await {
            tracing::debug!(%key, "quote cache hit");
            return Ok(quote);
        }

        let quote = self
            .cache
            .try_get_with(key, self.compute_quote(pickup, drop))
            .await?;

        Ok(quote)
    }

    async fn compute_quote(
        &self,
        pickup: GeoPoint,
        drop: GeoPoint,
    ) -> Result<RouteQuote, QuoteError> {
        let Collaborators {
            directions,
            pricing,
            ..
        } = &self.collaborators;

        // surge doesn't depend on the route, so both are fetched together
        let (meters, surge_multiplier) = tokio::try_join!(
            async {
                directions
                    .distance_meters(pickup, drop)
                    .await
                    .map_err(QuoteError::Distance)
            },
            async { pricing.surge_multiplier().await.map_err(QuoteError::Surge) },
        )?;

        let distance_km = meters_to_km(meters);

        let fare = pricing
            .fare(distance_km, surge_multiplier)
            .await
            .map_err(QuoteError::Fare)?;

        tracing::info!(distance_km, surge_multiplier, fare, "computed quote");

        Ok(RouteQuote::new(distance_km, fare, surge_multiplier))
    }

    /// Books the ride. Not idempotent: confirming twice books twice.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingResult, BookingError> {
        request.validate()?;

        let response = self.collaborators.bookings.book_ride(request).await?;

        Ok(BookingResult::from_response(
            response,
            request.distance_km,
            &self.driver_placeholder,
        ))
    }
}
