use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Available,
    Busy,
    Offline,
    OnBreak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub license_number: String,
    pub vehicle_type: Option<String>,
    pub status: DriverStatus,
    pub verified: bool,
    /// Home hub; proximity and hub compatibility are scored from it.
    pub hub_id: Option<Uuid>,
    /// Last hub the driver is known to be at.
    pub current_hub_id: Option<Uuid>,
    pub rating: Option<f64>,
    pub total_deliveries: u32,
    /// Booking the driver is currently bound to, set together with `Busy`.
    pub current_booking: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn is_eligible(&self) -> bool {
        self.status == DriverStatus::Available && self.verified
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverRegistration {
    pub name: String,
    pub license_number: String,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub hub_id: Option<Uuid>,
    #[serde(default)]
    pub rating: Option<f64>,
    /// New drivers must be verified before they are matched.
    #[serde(default)]
    pub verified: bool,
}
