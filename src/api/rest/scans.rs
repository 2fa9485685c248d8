use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle::BookingHistory;
use crate::engine::state_machine::SCAN_KINDS;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::event::{EventType, ScanRequest, ShipmentEvent};
use crate::state::AppState;

const DEFAULT_RECENT_LIMIT: usize = 50;
const MAX_RECENT_LIMIT: usize = 500;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scans", post(process_scan))
        .route("/scans/permission/:number", post(check_permission))
        .route("/scans/types", get(scan_types))
        .route("/scans/bookings/:number/events", get(booking_events))
        .route("/scans/events/recent", get(recent_events))
        .route("/scans/events/:id", get(get_event))
}

#[derive(Serialize)]
pub struct PermissionResponse {
    pub booking_number: String,
    pub allowed: bool,
}

#[derive(Serialize)]
pub struct ScanTypeResponse {
    pub event_type: EventType,
    pub description: &'static str,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

async fn process_scan(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ShipmentEvent>, AppError> {
    Ok(Json(state.lifecycle.process_scan(payload, actor).await?))
}

async fn check_permission(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
    actor: Actor,
) -> Result<Json<PermissionResponse>, AppError> {
    let allowed = state
        .lifecycle
        .validate_scan_permission(&number, &actor)
        .await?;

    Ok(Json(PermissionResponse {
        booking_number: number,
        allowed,
    }))
}

async fn scan_types() -> Json<Vec<ScanTypeResponse>> {
    let types = SCAN_KINDS
        .iter()
        .map(|kind| {
            let event_type = kind.event_type();
            ScanTypeResponse {
                event_type,
                description: event_type.default_description(),
            }
        })
        .collect();

    Json(types)
}

async fn booking_events(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<BookingHistory>, AppError> {
    Ok(Json(state.lifecycle.history(&number).await?))
}

async fn recent_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ShipmentEvent>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    Ok(Json(state.journal.recent(limit).await?))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShipmentEvent>, AppError> {
    Ok(Json(state.journal.get(id).await?))
}
