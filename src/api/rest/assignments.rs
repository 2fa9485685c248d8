use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::actor::require_elevated;
use crate::engine::scheduler::SweepReport;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::booking::Booking;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments/sweep", post(run_sweep))
        .route("/assignments/:booking_id", post(assign_driver))
        .route("/assignments/:booking_id/hubs", post(assign_hubs))
        .route("/assignments/:booking_id/release", post(release_driver))
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Booking>, AppError> {
    require_elevated(&actor)?;
    Ok(Json(state.coordinator.assign(booking_id).await?))
}

async fn assign_hubs(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Booking>, AppError> {
    require_elevated(&actor)?;
    Ok(Json(state.coordinator.assign_hubs(booking_id).await?))
}

async fn release_driver(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    actor: Actor,
) -> Result<Json<Booking>, AppError> {
    require_elevated(&actor)?;
    state.coordinator.release(booking_id).await?;
    Ok(Json(state.bookings.get(booking_id).await?))
}

async fn run_sweep(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<SweepReport>, AppError> {
    require_elevated(&actor)?;
    Ok(Json(state.scheduler.sweep().await?))
}
