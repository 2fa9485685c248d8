use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::actor::require_elevated;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::driver::{Driver, DriverRegistration, DriverStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/verification", patch(update_driver_verification))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

#[derive(Deserialize)]
pub struct UpdateVerificationRequest {
    pub verified: bool,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<DriverRegistration>,
) -> Result<Json<Driver>, AppError> {
    require_elevated(&actor)?;
    Ok(Json(state.coordinator.register_driver(payload).await?))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    Ok(Json(state.coordinator.list_drivers().await?))
}

/// Drivers may toggle their own availability.
async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    if !actor.is_driver(id) {
        require_elevated(&actor)?;
    }
    Ok(Json(
        state.coordinator.set_driver_status(id, payload.status).await?,
    ))
}

async fn update_driver_verification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    actor: Actor,
    Json(payload): Json<UpdateVerificationRequest>,
) -> Result<Json<Driver>, AppError> {
    require_elevated(&actor)?;
    Ok(Json(
        state
            .coordinator
            .set_driver_verified(id, payload.verified)
            .await?,
    ))
}
