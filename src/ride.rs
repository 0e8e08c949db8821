use std::{future::Future, sync::Arc};

use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    booking::{BookingError, BookingRequest, BookingResult},
    geo::GeoPoint,
    pipeline::{GeocodeError, QuotePipeline},
    quote::{QuoteError, RouteQuote},
};

const RIDE_ID_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum RideError {
    #[error("ride was cancelled")]
    Cancelled,
    #[error("ride is busy with another request")]
    Busy,
    #[error("ride has no quote to confirm")]
    NotQuoted,
    #[error("ride is already booked")]
    AlreadyBooked,
    #[error("{0}")]
    Geocode(#[from] GeocodeError),
    #[error("{0}")]
    Quote(#[from] QuoteError),
    #[error("{0}")]
    Booking(#[from] BookingError),
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Resolving,
    Quoting,
    Booking,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RideState {
    Idle,
    Resolving,
    Quoting,
    Ready {
        quote: RouteQuote,
    },
    Booking {
        quote: RouteQuote,
    },
    Booked {
        quote: RouteQuote,
        booking: BookingResult,
    },
    Failed {
        stage: Stage,
        message: String,
        /// kept when booking fails, so the ride can be confirmed again
        quote: Option<RouteQuote>,
    },
    Cancelled,
}

impl RideState {
    fn in_flight(&self) -> bool {
        matches!(self, Self::Resolving | Self::Quoting | Self::Booking { .. })
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RideView {
    pub id: String,
    #[serde(flatten)]
    pub state: RideState,
}

struct Route {
    pickup: String,
    drop: String,
    pickup_coords: GeoPoint,
    drop_coords: GeoPoint,
}

struct Inner {
    state: RideState,
    route: Option<Route>,
}

/// One booking attempt, from typed addresses to a booked ride.
///
/// A flow runs one operation at a time. Once cancelled, whatever is in flight is
/// dropped and its result never lands in the flow's state.
pub struct RideFlow {
    id: String,
    pipeline: Arc<QuotePipeline>,
    cancel: CancellationToken,
    inner: Mutex<Inner>,
}

impl RideFlow {
    pub fn new(pipeline: Arc<QuotePipeline>) -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RIDE_ID_LEN)
            .map(char::from)
            .collect();

        Self {
            id,
            pipeline,
            cancel: CancellationToken::new(),
            inner: Mutex::new(Inner {
                state: RideState::Idle,
                route: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn view(&self) -> RideView {
        RideView {
            id: self.id.clone(),
            state: self.inner.lock().await.state.clone(),
        }
    }

    /// Resolves both addresses and quotes the route between them.
    ///
    /// Allowed from `Idle`, `Ready` and `Failed`, so a ride can be quoted again
    /// with different addresses before it's confirmed.
    #[tracing::instrument(skip(self), fields(ride = %self.id))]
    pub async fn quote(&self, pickup: &str, drop: &str) -> Result<RouteQuote, RideError> {
        {
            let mut inner = self.lock_idle().await?;
            if matches!(inner.state, RideState::Booked { .. }) {
                return Err(RideError::AlreadyBooked);
            }
            inner.state = RideState::Resolving;
            inner.route = None;
        }

        let resolved = self
            .until_cancelled(async {
                tokio::try_join!(
                    self.pipeline.resolve_address(pickup),
                    self.pipeline.resolve_address(drop),
                )
            })
            .await?;

        let (pickup_coords, drop_coords) = match resolved {
            Ok(coords) => coords,
            Err(e) => return self.fail(Stage::Resolving, None, e.into()).await,
        };

        self.set_state(RideState::Quoting).await?;

        let quoted = self
            .until_cancelled(self.pipeline.get_quote(pickup_coords, drop_coords))
            .await?;

        let quote = match quoted {
            Ok(quote) => quote,
            Err(e) => return self.fail(Stage::Quoting, None, e.into()).await,
        };

        let mut inner = self.lock_live().await?;
        inner.state = RideState::Ready {
            quote: quote.clone(),
        };
        inner.route = Some(Route {
            pickup: pickup.trim().to_string(),
            drop: drop.trim().to_string(),
            pickup_coords,
            drop_coords,
        });

        Ok(quote)
    }

    /// Books the quoted ride.
    #[tracing::instrument(skip(self), fields(ride = %self.id))]
    pub async fn confirm(&self) -> Result<BookingResult, RideError> {
        let (request, quote) = {
            let mut inner = self.lock_idle().await?;

            let quote = match &inner.state {
                RideState::Ready { quote }
                | RideState::Failed {
                    quote: Some(quote), ..
                } => quote.clone(),
                RideState::Booked { .. } => return Err(RideError::AlreadyBooked),
                _ => return Err(RideError::NotQuoted),
            };
            let route = inner.route.as_ref().ok_or(RideError::NotQuoted)?;

            let request = BookingRequest::new(
                route.pickup.clone(),
                route.drop.clone(),
                route.pickup_coords,
                route.drop_coords,
                &quote,
            );

            inner.state = RideState::Booking {
                quote: quote.clone(),
            };

            (request, quote)
        };

        let booked = self
            .until_cancelled(self.pipeline.confirm_booking(&request))
            .await?;

        let booking = match booked {
            Ok(booking) => booking,
            Err(e) => return self.fail(Stage::Booking, Some(quote), e.into()).await,
        };

        self.set_state(RideState::Booked {
            quote,
            booking: booking.clone(),
        })
        .await?;

        tracing::info!(driver = %booking.driver_name, eta = booking.eta_minutes, "ride booked");

        Ok(booking)
    }

    /// Stops the flow. Any operation in flight returns `Cancelled`, as does every later one.
    pub async fn cancel(&self) {
        self.cancel.cancel();
        self.inner.lock().await.state = RideState::Cancelled;
        tracing::debug!(ride = %self.id, "ride cancelled");
    }

    async fn until_cancelled<T>(&self, fut: impl Future<Output = T>) -> Result<T, RideError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RideError::Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn lock_live(&self) -> Result<tokio::sync::MutexGuard<'_, Inner>, RideError> {
        let inner = self.inner.lock().await;
        if self.cancel.is_cancelled() {
            return Err(RideError::Cancelled);
        }
        Ok(inner)
    }

    /// locks the flow, making sure nothing else is running on it
    async fn lock_idle(&self) -> Result<tokio::sync::MutexGuard<'_, Inner>, RideError> {
        let inner = self.lock_live().await?;
        if inner.state.in_flight() {
            return Err(RideError::Busy);
        }
        Ok(inner)
    }

    async fn set_state(&self, state: RideState) -> Result<(), RideError> {
        self.lock_live().await?.state = state;
        Ok(())
    }

    async fn fail<T>(
        &self,
        stage: Stage,
        quote: Option<RouteQuote>,
        error: RideError,
    ) -> Result<T, RideError> {
        tracing::warn!(ride = %self.id, ?stage, %error, "ride step failed");

        self.set_state(RideState::Failed {
            stage,
            message: error.to_string(),
            quote,
        })
        .await?;

        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::Sequence;
    use reqwest::StatusCode;

    use super::*;
    use crate::{
        backend::{BackendError, MockBookings, MockPricing},
        booking::{AssignedDriver, BookingResponse, DEFAULT_DRIVER_PLACEHOLDER},
        cache::CacheSettings,
        maps::{Directions, MapsError, MockDirections, MockGeocoder},
        pipeline::{
            tests::{collaborators, delhi, pitampura},
            Collaborators,
        },
    };

    const PICKUP: &str = "Connaught Place, New Delhi";
    const DROP: &str = "Pitampura, Delhi";

    fn flow(collaborators: Collaborators) -> Arc<RideFlow> {
        Arc::new(RideFlow::new(Arc::new(QuotePipeline::new(
            collaborators,
            &CacheSettings::default(),
            DEFAULT_DRIVER_PLACEHOLDER,
        ))))
    }

    fn geocoder() -> MockGeocoder {
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_geocode().returning(|address| {
            if address.starts_with("Pitampura") {
                Ok(pitampura())
            } else {
                Ok(delhi())
            }
        });
        geocoder
    }

    fn directions() -> MockDirections {
        let mut directions = MockDirections::new();
        directions
            .expect_distance_meters()
            .returning(|_, _| Ok(12345.0));
        directions
    }

    fn pricing() -> MockPricing {
        let mut pricing = MockPricing::new();
        pricing.expect_surge_multiplier().returning(|| Ok(1.5));
        pricing.expect_fare().returning(|_, _| Ok(222.3));
        pricing
    }

    fn server_error(endpoint: &'static str) -> BackendError {
        BackendError::Status {
            endpoint,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "something went wrong".into(),
        }
    }

    /// never answers in time
    struct StalledDirections;

    #[async_trait::async_trait]
    impl Directions for StalledDirections {
        async fn distance_meters(
            &self,
            _origin: GeoPoint,
            _destination: GeoPoint,
        ) -> Result<f64, MapsError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(12345.0)
        }
    }

    #[tokio::test]
    async fn test_quote_and_confirm() {
        let mut bookings = MockBookings::new();
        bookings
            .expect_book_ride()
            .withf(|r| r.pickup == PICKUP && r.drop == DROP && r.fare == 222.3)
            .times(1)
            .returning(|_| {
                Ok(BookingResponse {
                    driver: Some(AssignedDriver {
                        name: Some("Ravi".into()),
                    }),
                    eta: Some(8.0),
                })
            });

        let flow = flow(collaborators(geocoder(), directions(), pricing(), bookings));
        assert_eq!(flow.view().await.state, RideState::Idle);

        let quote = flow.quote(PICKUP, DROP).await.unwrap();
        assert_eq!(quote.distance_km, 12.35);
        assert_eq!(
            flow.view().await.state,
            RideState::Ready {
                quote: quote.clone()
            }
        );

        let booking = flow.confirm().await.unwrap();
        assert_eq!(booking.driver_name, "Ravi");
        assert_eq!(booking.eta_minutes, 8);
        assert_eq!(
            flow.view().await.state,
            RideState::Booked { quote, booking }
        );

        assert!(matches!(
            flow.confirm().await,
            Err(RideError::AlreadyBooked)
        ));
        assert!(matches!(
            flow.quote(PICKUP, DROP).await,
            Err(RideError::AlreadyBooked)
        ));
    }

    #[tokio::test]
    async fn test_confirm_without_quote() {
        let flow = flow(collaborators(
            MockGeocoder::new(),
            MockDirections::new(),
            MockPricing::new(),
            MockBookings::new(),
        ));

        assert!(matches!(flow.confirm().await, Err(RideError::NotQuoted)));
        assert_eq!(flow.view().await.state, RideState::Idle);
    }

    #[tokio::test]
    async fn test_blank_address_fails_resolving() {
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_geocode().returning(|_| Ok(delhi()));

        let flow = flow(collaborators(
            geocoder,
            MockDirections::new(),
            MockPricing::new(),
            MockBookings::new(),
        ));

        let err = flow.quote(PICKUP, "   ").await.unwrap_err();
        assert!(matches!(
            err,
            RideError::Geocode(GeocodeError::EmptyAddress)
        ));
        assert!(matches!(
            flow.view().await.state,
            RideState::Failed {
                stage: Stage::Resolving,
                quote: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_quote_can_be_retried() {
        let mut seq = Sequence::new();
        let mut pricing = MockPricing::new();
        pricing.expect_surge_multiplier().returning(|| Ok(1.5));
        pricing
            .expect_fare()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(server_error("/calculate-fare")));
        pricing
            .expect_fare()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(222.3));

        let flow = flow(collaborators(
            geocoder(),
            directions(),
            pricing,
            MockBookings::new(),
        ));

        assert!(matches!(
            flow.quote(PICKUP, DROP).await,
            Err(RideError::Quote(QuoteError::Fare(_)))
        ));
        assert!(matches!(
            flow.view().await.state,
            RideState::Failed {
                stage: Stage::Quoting,
                ..
            }
        ));

        let quote = flow.quote(PICKUP, DROP).await.unwrap();
        assert_eq!(quote.fare, 222.3);
    }

    #[tokio::test]
    async fn test_failed_booking_keeps_quote() {
        let mut seq = Sequence::new();
        let mut bookings = MockBookings::new();
        bookings
            .expect_book_ride()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(server_error("/book-ride")));
        bookings
            .expect_book_ride()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(BookingResponse::default()));

        let flow = flow(collaborators(geocoder(), directions(), pricing(), bookings));
        let quote = flow.quote(PICKUP, DROP).await.unwrap();

        assert!(matches!(
            flow.confirm().await,
            Err(RideError::Booking(BookingError::Backend(_)))
        ));
        match flow.view().await.state {
            RideState::Failed {
                stage: Stage::Booking,
                quote: kept,
                ..
            } => assert_eq!(kept, Some(quote)),
            state => panic!("unexpected state {state:?}"),
        }

        let booking = flow.confirm().await.unwrap();
        assert_eq!(booking.driver_name, DEFAULT_DRIVER_PLACEHOLDER);
        assert_eq!(booking.eta_minutes, 37);
    }

    #[tokio::test]
    async fn test_cancel_discards_in_flight_quote() {
        let flow = flow(collaborators(
            geocoder(),
            StalledDirections,
            pricing(),
            MockBookings::new(),
        ));

        let task = tokio::spawn({
            let flow = flow.clone();
            async move { flow.quote(PICKUP, DROP).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(flow.view().await.state, RideState::Quoting);

        flow.cancel().await;

        assert!(matches!(task.await.unwrap(), Err(RideError::Cancelled)));
        assert_eq!(flow.view().await.state, RideState::Cancelled);
        assert!(matches!(
            flow.quote(PICKUP, DROP).await,
            Err(RideError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_busy_while_in_flight() {
        let flow = flow(collaborators(
            geocoder(),
            StalledDirections,
            pricing(),
            MockBookings::new(),
        ));

        let task = tokio::spawn({
            let flow = flow.clone();
            async move { flow.quote(PICKUP, DROP).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            flow.quote(PICKUP, DROP).await,
            Err(RideError::Busy)
        ));
        assert!(matches!(flow.confirm().await, Err(RideError::Busy)));

        flow.cancel().await;
        assert!(matches!(task.await.unwrap(), Err(RideError::Cancelled)));
    }

    #[test]
    fn test_view_json() {
        let view = RideView {
            id: "abc".into(),
            state: RideState::Failed {
                stage: Stage::Quoting,
                message: "boom".into(),
                quote: None,
            },
        };

        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            serde_json::json!({
                "id": "abc",
                "state": "failed",
                "stage": "quoting",
                "message": "boom",
                "quote": null,
            })
        );
    }

    #[test]
    fn test_ride_ids() {
        let pipeline = Arc::new(QuotePipeline::new(
            collaborators(
                MockGeocoder::new(),
                MockDirections::new(),
                MockPricing::new(),
                MockBookings::new(),
            ),
            &CacheSettings::default(),
            DEFAULT_DRIVER_PLACEHOLDER,
        ));

        let a = RideFlow::new(pipeline.clone());
        let b = RideFlow::new(pipeline);

        assert_eq!(a.id().len(), RIDE_ID_LEN);
        assert!(a.id().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.id(), b.id());
    }
}
