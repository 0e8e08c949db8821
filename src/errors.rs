use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    auth::AuthError,
    booking::BookingError,
    pipeline::GeocodeError,
    quote::QuoteError,
    ride::RideError,
};

/// Every error a gateway handler can return
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Geocode(#[from] GeocodeError),
    #[error("{0}")]
    Quote(#[from] QuoteError),
    #[error("{0}")]
    Booking(#[from] BookingError),
    #[error("{0}")]
    Ride(#[from] RideError),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("no ride with id {0}")]
    RideNotFound(String),
}

impl AppError {
    /// name of the failure as sent to clients, and the status it's sent with
    fn classify(&self) -> (&'static str, StatusCode) {
        use StatusCode as S;

        match self {
            // a blank address is still a failure to resolve it
            Self::Geocode(_) | Self::Ride(RideError::Geocode(_)) => {
                ("GeocodeFailure", S::BAD_GATEWAY)
            }
            Self::Quote(_) | Self::Ride(RideError::Quote(_)) => ("QuoteFailure", S::BAD_GATEWAY),
            Self::Booking(BookingError::MissingAddress)
            | Self::Ride(RideError::Booking(BookingError::MissingAddress)) => {
                ("ValidationFailure", S::BAD_REQUEST)
            }
            Self::Booking(_) | Self::Ride(RideError::Booking(_)) => {
                ("BookingFailure", S::BAD_GATEWAY)
            }
            Self::Ride(RideError::Cancelled) => ("Cancelled", S::CONFLICT),
            Self::Ride(RideError::Busy) => ("Busy", S::CONFLICT),
            Self::Ride(RideError::NotQuoted | RideError::AlreadyBooked) => {
                ("InvalidState", S::CONFLICT)
            }
            Self::Auth(AuthError::Validation(_)) => ("ValidationFailure", S::BAD_REQUEST),
            Self::Auth(AuthError::NoPendingSignUp(_)) => ("NoPendingSignUp", S::NOT_FOUND),
            Self::Auth(AuthError::Backend(_)) => ("AuthFailure", S::BAD_GATEWAY),
            Self::Auth(AuthError::Session(_)) => ("SessionFailure", S::INTERNAL_SERVER_ERROR),
            Self::RideNotFound(_) => ("NotFound", S::NOT_FOUND),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.classify().0
    }

    pub fn status(&self) -> StatusCode {
        self.classify().1
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }

        let json = json!({
            "error": format!("{self}"),
            "kind": self.kind(),
        });

        (status, Json(json)).into_response()
    }
}
