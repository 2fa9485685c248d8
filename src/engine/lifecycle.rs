use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::assignment::AssignmentCoordinator;
use crate::engine::journal::{EventDetails, EventJournal};
use crate::engine::state_machine::{ensure_transition, NextExpected, ScanContext, ScanEffect, ScanKind};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::event::{EventType, ScanRequest, ShipmentEvent};
use crate::observability::metrics::Metrics;
use crate::store::BookingStore;

/// A booking's history together with the derived status hint.
#[derive(Debug, Clone, Serialize)]
pub struct BookingHistory {
    pub booking_number: String,
    pub current_status: BookingStatus,
    pub next_expected: NextExpected,
    pub events: Vec<ShipmentEvent>,
}

/// Applies scans and administrative status changes to bookings.
pub struct LifecycleProcessor {
    bookings: Arc<dyn BookingStore>,
    coordinator: Arc<AssignmentCoordinator>,
    journal: Arc<EventJournal>,
    metrics: Arc<Metrics>,
}

impl LifecycleProcessor {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        coordinator: Arc<AssignmentCoordinator>,
        journal: Arc<EventJournal>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            bookings,
            coordinator,
            journal,
            metrics,
        }
    }

    pub async fn process_scan(&self, request: ScanRequest, actor: Actor) -> Result<ShipmentEvent, AppError> {
        let kind = ScanKind::try_from(request.scan_type)?;
        let booking_id = self.find_by_number(&request.booking_number).await?.id;

        let _booking_guard = self.coordinator.lock_booking(booking_id).await;
        // Re-read under the lock; a concurrent scan may have moved it on.
        let mut booking = self.load_booking(booking_id).await?;

        if !can_scan(&booking, &actor) {
            return Err(AppError::PermissionDenied(format!(
                "{:?} {} may not scan booking {}",
                actor.role, actor.id, booking.booking_number
            )));
        }

        let handler = kind.handler();
        let description = (handler.describe)(&ScanContext {
            location: request.location.as_deref(),
            notes: request.notes.as_deref(),
        });
        let effect = (handler.apply)(booking.status)?;

        let now = Utc::now();
        if let ScanEffect::MoveTo(next) = effect {
            booking.status = next;
            booking.updated_at = now;
        }
        stamp_milestone(&mut booking, kind.event_type(), now);

        let image_ref = request
            .image_base64
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .map(|_| format!("image_captured_{}", now.timestamp_millis()));

        let event = EventJournal::build(
            &booking,
            kind.event_type(),
            description,
            EventDetails {
                actor: Some(actor),
                location: request.location,
                coordinates: request.coordinates,
                notes: request.notes,
                image_ref,
            },
        );
        let event = self.journal.append(event).await?;
        self.bookings.save(&booking).await?;

        self.metrics
            .scans_total
            .with_label_values(&[kind.event_type().as_str()])
            .inc();

        info!(
            booking_id = %booking.id,
            event_type = %event.event_type,
            status = %booking.status,
            "scan processed"
        );

        if matches!(effect, ScanEffect::MoveTo(BookingStatus::Delivered | BookingStatus::Failed)) {
            self.release_after_finish(&booking).await?;
        }

        Ok(event)
    }

    pub async fn validate_scan_permission(&self, booking_number: &str, actor: &Actor) -> Result<bool, AppError> {
        let booking = self.find_by_number(booking_number).await?;
        Ok(can_scan(&booking, actor))
    }

    pub async fn confirm(&self, booking_id: Uuid, actor: Actor) -> Result<Booking, AppError> {
        self.transition(
            booking_id,
            BookingStatus::Confirmed,
            actor,
            Some("Booking confirmed".to_string()),
            None,
        )
        .await
    }

    pub async fn cancel(&self, booking_id: Uuid, actor: Actor, reason: Option<String>) -> Result<Booking, AppError> {
        let description = match &reason {
            Some(reason) => format!("Booking cancelled - {reason}"),
            None => "Booking cancelled".to_string(),
        };
        self.transition(booking_id, BookingStatus::Cancelled, actor, Some(description), reason)
            .await
    }

    /// Administrative override. Still bound by the transition table.
    pub async fn update_status(&self, booking_id: Uuid, status: BookingStatus, actor: Actor) -> Result<Booking, AppError> {
        self.transition(booking_id, status, actor, None, None).await
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
        actor: Actor,
        description: Option<String>,
        notes: Option<String>,
    ) -> Result<Booking, AppError> {
        if !actor.is_elevated() {
            return Err(AppError::PermissionDenied(format!(
                "{:?} {} may not change booking status",
                actor.role, actor.id
            )));
        }
        if target == BookingStatus::Assigned {
            return Err(AppError::PreconditionViolation(
                "drivers are bound through assignment, not status overrides".to_string(),
            ));
        }

        let _booking_guard = self.coordinator.lock_booking(booking_id).await;
        let mut booking = self.load_booking(booking_id).await?;
        let from = booking.status;
        ensure_transition(from, target)?;

        let now = Utc::now();
        let event_type = target.entry_event();
        booking.status = target;
        booking.updated_at = now;
        stamp_milestone(&mut booking, event_type, now);

        // Snapshot with the driver still bound, for the release below.
        let bound = booking.clone();
        if !target.allows_driver() {
            booking.driver_id = None;
        }

        let description =
            description.unwrap_or_else(|| format!("Booking status changed from {from} to {target}"));
        self.journal
            .record(
                &booking,
                event_type,
                description,
                EventDetails {
                    notes,
                    ..EventDetails::by(actor)
                },
            )
            .await?;
        self.bookings.save(&booking).await?;

        info!(
            booking_id = %booking.id,
            from = %from,
            to = %target,
            actor_id = %actor.id,
            "booking status changed"
        );

        if target.is_terminal() {
            self.release_after_finish(&bound).await?;
        }

        Ok(booking)
    }

    /// The booking is already saved as finished; a failure here leaves the driver BUSY.
    async fn release_after_finish(&self, booking: &Booking) -> Result<(), AppError> {
        if let Err(err) = self.coordinator.release_driver(booking).await {
            error!(
                booking_id = %booking.id,
                driver_id = ?booking.driver_id,
                error = %err,
                "driver release failed; retry with POST /assignments/{}/release",
                booking.id
            );
            return Err(err);
        }
        Ok(())
    }

    pub async fn history(&self, booking_number: &str) -> Result<BookingHistory, AppError> {
        let booking = self.find_by_number(booking_number).await?;
        let events = self.journal.history(booking.id).await?;

        Ok(BookingHistory {
            booking_number: booking.booking_number,
            current_status: booking.status,
            next_expected: EventJournal::next_expected(&events)
                .unwrap_or_else(|| booking.status.next_expected()),
            events,
        })
    }

    async fn find_by_number(&self, booking_number: &str) -> Result<Booking, AppError> {
        self.bookings
            .get_by_number(booking_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_number} not found")))
    }

    async fn load_booking(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))
    }
}

/// The assigned driver or an elevated role may scan.
fn can_scan(booking: &Booking, actor: &Actor) -> bool {
    actor.is_elevated()
        || booking
            .driver_id
            .is_some_and(|driver_id| actor.is_driver(driver_id))
}

fn stamp_milestone(booking: &mut Booking, event_type: EventType, now: DateTime<Utc>) {
    match event_type {
        EventType::PickupCompleted => booking.actual_pickup_at = Some(now),
        EventType::InTransit => {
            booking.actual_pickup_at.get_or_insert(now);
        }
        EventType::DeliveryCompleted => booking.actual_delivery_at = Some(now),
        _ => {}
    }
}
