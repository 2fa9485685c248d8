use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::api::rest::actor::require_elevated;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::hub::{Hub, HubRegistration};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/hubs", post(register_hub).get(list_hubs))
}

async fn register_hub(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<HubRegistration>,
) -> Result<Json<Hub>, AppError> {
    require_elevated(&actor)?;
    Ok(Json(state.coordinator.register_hub(payload).await?))
}

async fn list_hubs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Hub>>, AppError> {
    Ok(Json(state.coordinator.list_hubs().await?))
}
