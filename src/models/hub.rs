use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubRegistration {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}
