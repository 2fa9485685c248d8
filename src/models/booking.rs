use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Assigned => "ASSIGNED",
            BookingStatus::InTransit => "IN_TRANSIT",
            BookingStatus::Delivered => "DELIVERED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "ASSIGNED" => Ok(BookingStatus::Assigned),
            "IN_TRANSIT" => Ok(BookingStatus::InTransit),
            "DELIVERED" => Ok(BookingStatus::Delivered),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "FAILED" => Ok(BookingStatus::Failed),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_number: String,
    pub requester_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup_hub_id: Option<Uuid>,
    pub delivery_hub_id: Option<Uuid>,
    pub pickup_address: String,
    pub delivery_address: String,
    pub pickup: Option<GeoPoint>,
    pub delivery: Option<GeoPoint>,
    pub status: BookingStatus,
    pub scheduled_pickup_at: Option<DateTime<Utc>>,
    pub scheduled_delivery_at: Option<DateTime<Utc>>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub total_price: f64,
    pub distance_km: Option<f64>,
    pub special_instructions: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub pickup_address: String,
    pub delivery_address: String,
    #[serde(default)]
    pub pickup: Option<GeoPoint>,
    #[serde(default)]
    pub delivery: Option<GeoPoint>,
    #[serde(default)]
    pub scheduled_pickup_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_delivery_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
