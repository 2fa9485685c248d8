use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::engine::state_machine::NextExpected;
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::booking::Booking;
use crate::models::driver::GeoPoint;
use crate::models::event::{EventType, ShipmentEvent};
use crate::store::EventStore;

/// Optional fields of an event beyond type and description.
#[derive(Debug, Clone, Default)]
pub struct EventDetails {
    pub actor: Option<Actor>,
    pub location: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub notes: Option<String>,
    pub image_ref: Option<String>,
}

impl EventDetails {
    pub fn by(actor: Actor) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }
}

/// Append-only shipment history with live fan-out to subscribers.
pub struct EventJournal {
    store: Arc<dyn EventStore>,
    events_tx: broadcast::Sender<ShipmentEvent>,
}

impl EventJournal {
    pub fn new(store: Arc<dyn EventStore>, buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { store, events_tx }
    }

    /// Builds the event for `booking` as it stands now (its status is recorded on the event).
    pub fn build(
        booking: &Booking,
        event_type: EventType,
        description: impl Into<String>,
        details: EventDetails,
    ) -> ShipmentEvent {
        ShipmentEvent {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            booking_number: booking.booking_number.clone(),
            event_type,
            description: description.into(),
            timestamp: Utc::now(),
            booking_status: booking.status,
            location: details.location,
            coordinates: details.coordinates,
            actor: details.actor,
            notes: details.notes,
            image_ref: details.image_ref,
        }
    }

    pub async fn append(&self, event: ShipmentEvent) -> Result<ShipmentEvent, AppError> {
        self.store.append(&event).await?;

        debug!(
            booking_id = %event.booking_id,
            event_type = %event.event_type,
            "shipment event recorded"
        );

        // No subscribers is fine.
        let _ = self.events_tx.send(event.clone());
        Ok(event)
    }

    pub async fn record(
        &self,
        booking: &Booking,
        event_type: EventType,
        description: impl Into<String>,
        details: EventDetails,
    ) -> Result<ShipmentEvent, AppError> {
        self.append(Self::build(booking, event_type, description, details))
            .await
    }

    pub async fn history(&self, booking_id: Uuid) -> Result<Vec<ShipmentEvent>, AppError> {
        self.store.list_by_booking(booking_id).await
    }

    pub async fn get(&self, event_id: Uuid) -> Result<ShipmentEvent, AppError> {
        self.store
            .get(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {event_id} not found")))
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<ShipmentEvent>, AppError> {
        self.store.list_recent(limit).await
    }

    /// Hint derived from the newest event of a history (newest first), if any.
    pub fn next_expected(history: &[ShipmentEvent]) -> Option<NextExpected> {
        history
            .first()
            .map(|latest| latest.booking_status.next_expected())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShipmentEvent> {
        self.events_tx.subscribe()
    }
}
