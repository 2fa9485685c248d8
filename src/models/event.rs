use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::actor::Actor;
use crate::models::booking::BookingStatus;
use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    BookingCreated,
    BookingConfirmed,
    DriverAssigned,
    PickupScheduled,
    PickupAttempted,
    PickupCompleted,
    InTransit,
    OutForDelivery,
    DeliveryAttempted,
    DeliveryCompleted,
    DeliveryFailed,
    BookingCancelled,
    Exception,
    ScanEvent,
    HubArrival,
    HubDeparture,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BookingCreated => "BOOKING_CREATED",
            EventType::BookingConfirmed => "BOOKING_CONFIRMED",
            EventType::DriverAssigned => "DRIVER_ASSIGNED",
            EventType::PickupScheduled => "PICKUP_SCHEDULED",
            EventType::PickupAttempted => "PICKUP_ATTEMPTED",
            EventType::PickupCompleted => "PICKUP_COMPLETED",
            EventType::InTransit => "IN_TRANSIT",
            EventType::OutForDelivery => "OUT_FOR_DELIVERY",
            EventType::DeliveryAttempted => "DELIVERY_ATTEMPTED",
            EventType::DeliveryCompleted => "DELIVERY_COMPLETED",
            EventType::DeliveryFailed => "DELIVERY_FAILED",
            EventType::BookingCancelled => "BOOKING_CANCELLED",
            EventType::Exception => "EXCEPTION",
            EventType::ScanEvent => "SCAN_EVENT",
            EventType::HubArrival => "HUB_ARRIVAL",
            EventType::HubDeparture => "HUB_DEPARTURE",
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            EventType::BookingCreated => "Booking was created",
            EventType::BookingConfirmed => "Booking was confirmed",
            EventType::DriverAssigned => "Driver was assigned to booking",
            EventType::PickupScheduled => "Pickup was scheduled",
            EventType::PickupAttempted => "Pickup was attempted",
            EventType::PickupCompleted => "Package was picked up",
            EventType::InTransit => "Package is in transit",
            EventType::OutForDelivery => "Package is out for delivery",
            EventType::DeliveryAttempted => "Delivery was attempted",
            EventType::DeliveryCompleted => "Package was delivered",
            EventType::DeliveryFailed => "Delivery failed",
            EventType::BookingCancelled => "Booking was cancelled",
            EventType::Exception => "Exception occurred during shipment",
            EventType::ScanEvent => "Package was scanned",
            EventType::HubArrival => "Package arrived at hub",
            EventType::HubDeparture => "Package departed from hub",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record. Never mutated after it is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub booking_number: String,
    pub event_type: EventType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Booking status right after this event was applied.
    pub booking_status: BookingStatus,
    pub location: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub actor: Option<Actor>,
    pub notes: Option<String>,
    pub image_ref: Option<String>,
}

/// A physical checkpoint reported by a scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub booking_number: String,
    pub scan_type: EventType,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl ScanRequest {
    pub fn new(booking_number: impl Into<String>, scan_type: EventType) -> Self {
        Self {
            booking_number: booking_number.into(),
            scan_type,
            location: None,
            coordinates: None,
            notes: None,
            image_base64: None,
        }
    }
}
