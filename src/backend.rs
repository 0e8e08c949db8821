use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::{
    auth::Registration,
    booking::{BookingRequest, BookingResponse},
};

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("network error")]
    Network(#[from] reqwest::Error),
    #[error("json parse error")]
    JsonParse(reqwest::Error),
    #[error("{endpoint} responded with {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Pricing: Send + Sync {
    /// the current, global surge multiplier
    async fn surge_multiplier(&self) -> Result<f64, BackendError>;

    async fn fare(&self, distance_km: f64, surge_multiplier: f64) -> Result<f64, BackendError>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Bookings: Send + Sync {
    async fn book_ride(&self, request: &BookingRequest) -> Result<BookingResponse, BackendError>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Accounts: Send + Sync {
    async fn send_otp(&self, email: &str, phone: &str) -> Result<(), BackendError>;

    /// returns the session token
    async fn register(&self, registration: &Registration) -> Result<String, BackendError>;

    async fn resend_otp(&self, email: &str) -> Result<(), BackendError>;
}

/// JSON client for the ride backend
pub struct RideApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SurgeResponse {
    multiplier: f64,
}

#[derive(Deserialize)]
struct FareResponse {
    fare: f64,
}

#[derive(Deserialize)]
struct RegisterResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl RideApi {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<reqwest::Response, BackendError> {
        let res = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await?;

        check_status(endpoint, res).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<T, BackendError> {
        let res = self.post(endpoint, body).await?;
        res.json().await.map_err(BackendError::JsonParse)
    }
}

/// turns a non-success response into an error, keeping the backend's message if it sent one
async fn check_status(
    endpoint: &'static str,
    res: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let message = res
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    tracing::warn!(endpoint, %status, error = %message, "backend request failed");

    Err(BackendError::Status {
        endpoint,
        status,
        message,
    })
}

#[async_trait::async_trait]
impl Pricing for RideApi {
    #[tracing::instrument(skip(self))]
    async fn surge_multiplier(&self) -> Result<f64, BackendError> {
        let endpoint = "/calculate-surge";
        let res = self.client.get(self.url(endpoint)).send().await?;
        let res = check_status(endpoint, res).await?;

        let surge: SurgeResponse = res.json().await.map_err(BackendError::JsonParse)?;
        Ok(surge.multiplier)
    }

    #[tracing::instrument(skip(self))]
    async fn fare(&self, distance_km: f64, surge_multiplier: f64) -> Result<f64, BackendError> {
        let res: FareResponse = self
            .post_json(
                "/calculate-fare",
                &json!({
                    "distance": distance_km,
                    "surgeMultiplier": surge_multiplier,
                }),
            )
            .await?;

        Ok(res.fare)
    }
}

#[async_trait::async_trait]
impl Bookings for RideApi {
    #[tracing::instrument(skip(self))]
    async fn book_ride(&self, request: &BookingRequest) -> Result<BookingResponse, BackendError> {
        self.post_json("/book-ride", request).await
    }
}

#[async_trait::async_trait]
impl Accounts for RideApi {
    #[tracing::instrument(skip(self))]
    async fn send_otp(&self, email: &str, phone: &str) -> Result<(), BackendError> {
        self.post("/auth/send-otp", &json!({ "email": email, "phone": phone }))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<String, BackendError> {
        let res: RegisterResponse = self.post_json("/auth/register", registration).await?;
        Ok(res.token)
    }

    #[tracing::instrument(skip(self))]
    async fn resend_otp(&self, email: &str) -> Result<(), BackendError> {
        self.post("/auth/resend-otp", &json!({ "email": email }))
            .await?;
        Ok(())
    }
}
