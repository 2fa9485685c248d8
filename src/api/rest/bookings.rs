use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::booking::{Booking, BookingStatus, NewBooking};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/mine", get(list_my_bookings))
        .route("/bookings/number/:number", get(get_booking_by_number))
        .route("/bookings/status/:status", get(list_bookings_by_status))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/status", put(update_booking_status))
        .route("/bookings/:id/confirm", post(confirm_booking))
        .route("/bookings/:id/cancel", post(cancel_booking))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewBooking>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.create(payload, actor).await?;
    Ok(Json(booking))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(id).await?))
}

async fn get_booking_by_number(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_by_number(&number).await?))
}

async fn list_bookings_by_status(
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = status.parse::<BookingStatus>().map_err(AppError::BadRequest)?;
    Ok(Json(state.bookings.list_by_status(status).await?))
}

async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_requester(actor.id).await?))
}

async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .lifecycle
        .update_status(id, payload.status, actor)
        .await?;
    Ok(Json(booking))
}

async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.lifecycle.confirm(id, actor).await?))
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<Booking>, AppError> {
    let reason = payload.and_then(|Json(request)| request.reason);
    Ok(Json(state.lifecycle.cancel(id, actor, reason).await?))
}
