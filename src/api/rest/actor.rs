use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The caller identity as asserted by the gateway in front of this service.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|err| AppError::BadRequest(format!("invalid {ACTOR_ID_HEADER}: {err}")))?;
        let role = header(parts, ACTOR_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(AppError::BadRequest)?;

        Ok(Actor::new(id, role))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::BadRequest(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| AppError::BadRequest(format!("{name} header is not valid text")))
}

/// Fleet and dispatch operations are reserved for admins and hub managers.
pub fn require_elevated(actor: &Actor) -> Result<(), AppError> {
    if actor.is_elevated() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "{:?} {} may not perform this operation",
            actor.role, actor.id
        )))
    }
}
