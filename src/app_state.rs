use std::{sync::Arc, time::Duration};

use ahash::RandomState;
use moka::future::Cache;

use crate::{
    auth::Auth,
    backend::RideApi,
    config::Config,
    errors::AppError,
    maps::GoogleMaps,
    pipeline::{Collaborators, QuotePipeline},
    ride::RideFlow,
    session::{FileSessionStore, SessionStore},
};

pub struct AppState {
    pub pipeline: Arc<QuotePipeline>,
    pub auth: Auth,
    // rides nobody has looked at for a while are dropped
    rides: Cache<String, Arc<RideFlow>, RandomState>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let maps = Arc::new(GoogleMaps::new(
            client.clone(),
            &config.google_maps_api_base,
            &config.google_maps_api_key,
        ));
        let api = Arc::new(RideApi::new(client, &config.api_base_url));

        let collaborators = Collaborators {
            geocoder: maps.clone(),
            directions: maps,
            pricing: api.clone(),
            bookings: api.clone(),
        };

        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&config.session_path));

        Ok(Self::with_parts(
            QuotePipeline::new(collaborators, &config.cache, &config.driver_placeholder),
            Auth::new(api, store),
            config.ride_idle_timeout,
        ))
    }

    pub fn with_parts(pipeline: QuotePipeline, auth: Auth, ride_idle_timeout: Duration) -> Self {
        let rides = Cache::<String, Arc<RideFlow>>::builder()
            .time_to_idle(ride_idle_timeout)
            .build_with_hasher(RandomState::default());

        Self {
            pipeline: Arc::new(pipeline),
            auth,
            rides,
        }
    }

    /// starts a new ride flow and keeps it around until it's removed
    pub async fn new_ride(&self) -> Arc<RideFlow> {
        let ride = Arc::new(RideFlow::new(self.pipeline.clone()));
        self.rides
            .insert(ride.id().to_string(), ride.clone())
            .await;
        ride
    }

    pub async fn ride(&self, id: &str) -> Result<Arc<RideFlow>, AppError> {
        self.rides
            .get(id)
            .await
            .ok_or_else(|| AppError::RideNotFound(id.to_string()))
    }

    /// cancels the ride and forgets it
    pub async fn remove_ride(&self, id: &str) -> Result<(), AppError> {
        let ride = self
            .rides
            .remove(id)
            .await
            .ok_or_else(|| AppError::RideNotFound(id.to_string()))?;

        ride.cancel().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{MockAccounts, MockBookings, MockPricing},
        booking::DEFAULT_DRIVER_PLACEHOLDER,
        cache::CacheSettings,
        maps::{MockDirections, MockGeocoder},
        pipeline::tests::collaborators,
        ride::RideState,
        session::MemorySessionStore,
    };

    fn state(ride_idle_timeout: Duration) -> AppState {
        let pipeline = QuotePipeline::new(
            collaborators(
                MockGeocoder::new(),
                MockDirections::new(),
                MockPricing::new(),
                MockBookings::new(),
            ),
            &CacheSettings::default(),
            DEFAULT_DRIVER_PLACEHOLDER,
        );
        let auth = Auth::new(
            Arc::new(MockAccounts::new()),
            Arc::new(MemorySessionStore::default()),
        );

        AppState::with_parts(pipeline, auth, ride_idle_timeout)
    }

    #[tokio::test]
    async fn test_idle_rides_are_dropped() {
        let state = state(Duration::from_millis(50));

        let ride = state.new_ride().await;
        let id = ride.id().to_string();
        drop(ride);

        assert!(state.ride(&id).await.is_ok());

        tokio::time::sleep(Duration::from_millis(150)).await;
        state.rides.run_pending_tasks().await;

        assert!(matches!(
            state.ride(&id).await,
            Err(AppError::RideNotFound(_))
        ));
        assert_eq!(state.rides.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_ride_cancels_it() {
        let state = state(Duration::from_secs(60));

        let ride = state.new_ride().await;
        state.remove_ride(ride.id()).await.unwrap();

        assert_eq!(ride.view().await.state, RideState::Cancelled);
        assert!(matches!(
            state.remove_ride(ride.id()).await,
            Err(AppError::RideNotFound(_))
        ));
    }
}
