use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    app_state::AppState,
    auth::SignUpForm,
    errors::AppError,
    geo::GeoPoint,
    maps::PlaceSuggestion,
    quote::RouteQuote,
    ride::{RideError, RideView},
    session::Session,
};

type Shared = State<Arc<AppState>>;

pub fn make_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/places/suggestions", get(suggestions))
        .route("/places/geocode", post(geocode))
        .route("/quotes", post(quote))
        .route("/rides", post(create_ride))
        .route("/rides/:id", get(get_ride).delete(delete_ride))
        .route("/rides/:id/quote", post(requote_ride))
        .route("/rides/:id/confirm", post(confirm_ride))
        .route("/auth/signup", post(sign_up))
        .route("/auth/verify", post(verify_otp))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/signin", post(sign_in))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
}

#[derive(Deserialize)]
pub struct SuggestionParams {
    #[serde(default)]
    input: String,
}

async fn suggestions(
    State(state): Shared,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Vec<PlaceSuggestion>>, AppError> {
    Ok(Json(state.pipeline.suggest_addresses(&params.input).await?))
}

#[derive(Deserialize)]
pub struct GeocodeParams {
    address: String,
}

async fn geocode(
    State(state): Shared,
    Json(params): Json<GeocodeParams>,
) -> Result<Json<GeoPoint>, AppError> {
    Ok(Json(state.pipeline.resolve_address(&params.address).await?))
}

#[derive(Deserialize)]
pub struct QuoteParams {
    pickup: GeoPoint,
    drop: GeoPoint,
}

#[derive(Serialize, Debug)]
pub struct QuoteResponse {
    #[serde(flatten)]
    quote: RouteQuote,
    /// shown as "Peak Time"
    peak: bool,
}

impl From<RouteQuote> for QuoteResponse {
    fn from(quote: RouteQuote) -> Self {
        Self {
            peak: quote.is_peak(),
            quote,
        }
    }
}

async fn quote(
    State(state): Shared,
    Json(params): Json<QuoteParams>,
) -> Result<Json<QuoteResponse>, AppError> {
    let quote = state.pipeline.get_quote(params.pickup, params.drop).await?;
    Ok(Json(quote.into()))
}

#[derive(Deserialize)]
pub struct RideParams {
    pickup: String,
    drop: String,
}

/// Starts a ride and quotes it.
///
/// A failed quote still answers with the ride, in its failed state, so it can be quoted again.
async fn create_ride(
    State(state): Shared,
    Json(params): Json<RideParams>,
) -> Result<(StatusCode, Json<RideView>), AppError> {
    let ride = state.new_ride().await;

    match ride.quote(&params.pickup, &params.drop).await {
        Ok(_) => {}
        Err(e @ (RideError::Cancelled | RideError::Busy)) => return Err(e.into()),
        Err(e) => tracing::debug!(ride = ride.id(), error = %e, "new ride failed to quote"),
    }

    Ok((StatusCode::CREATED, Json(ride.view().await)))
}

async fn get_ride(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<RideView>, AppError> {
    let ride = state.ride(&id).await?;
    Ok(Json(ride.view().await))
}

async fn requote_ride(
    State(state): Shared,
    Path(id): Path<String>,
    Json(params): Json<RideParams>,
) -> Result<Json<RideView>, AppError> {
    let ride = state.ride(&id).await?;
    ride.quote(&params.pickup, &params.drop).await?;
    Ok(Json(ride.view().await))
}

async fn confirm_ride(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<RideView>, AppError> {
    let ride = state.ride(&id).await?;
    ride.confirm().await?;
    Ok(Json(ride.view().await))
}

async fn delete_ride(State(state): Shared, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    state.remove_ride(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sign_up(
    State(state): Shared,
    Json(form): Json<SignUpForm>,
) -> Result<StatusCode, AppError> {
    state.auth.sign_up(form).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct VerifyParams {
    email: String,
    otp: String,
}

async fn verify_otp(
    State(state): Shared,
    Json(params): Json<VerifyParams>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.auth.verify_otp(&params.email, &params.otp).await?))
}

#[derive(Deserialize)]
pub struct ResendParams {
    email: String,
}

async fn resend_otp(
    State(state): Shared,
    Json(params): Json<ResendParams>,
) -> Result<StatusCode, AppError> {
    state.auth.resend_otp(&params.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct SignInParams {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn sign_in(
    State(state): Shared,
    Json(params): Json<SignInParams>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.auth.sign_in(&params.email, &params.password).await?))
}

async fn logout(State(state): Shared) -> Result<StatusCode, AppError> {
    state.auth.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session(State(state): Shared) -> Json<Option<Session>> {
    Json(state.auth.current_user().await)
}
