//! Booking lifecycle rules.
//!
//! ```text
//! PENDING -> CONFIRMED -> ASSIGNED -> IN_TRANSIT -> DELIVERED
//!    any non-terminal -> CANCELLED | FAILED
//! ```
//!
//! Scans are dispatched through [`ScanKind::handler`], one entry per scannable
//! event type. Adding a scannable event type without a handler is a compile error.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::booking::BookingStatus;
use crate::models::event::EventType;

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Delivered | BookingStatus::Cancelled | BookingStatus::Failed
        )
    }

    /// Whether a booking in this status may carry a bound driver.
    pub fn allows_driver(&self) -> bool {
        matches!(
            self,
            BookingStatus::Assigned
                | BookingStatus::InTransit
                | BookingStatus::Delivered
                | BookingStatus::Failed
        )
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, Assigned) => true,
            (Assigned, InTransit) => true,
            (InTransit, Delivered) => true,
            (from, Cancelled | Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn next_expected(&self) -> NextExpected {
        match self {
            BookingStatus::Pending => NextExpected::BookingConfirmed,
            BookingStatus::Confirmed => NextExpected::DriverAssigned,
            BookingStatus::Assigned => NextExpected::PickupCompleted,
            BookingStatus::InTransit => NextExpected::DeliveryCompleted,
            BookingStatus::Delivered => NextExpected::Completed,
            BookingStatus::Cancelled => NextExpected::None,
            // Hint only. No transition leaves FAILED.
            BookingStatus::Failed => NextExpected::RetryDelivery,
        }
    }

    /// Event recorded when a booking is moved into this status directly.
    pub fn entry_event(&self) -> EventType {
        match self {
            BookingStatus::Pending => EventType::BookingCreated,
            BookingStatus::Confirmed => EventType::BookingConfirmed,
            BookingStatus::Assigned => EventType::DriverAssigned,
            BookingStatus::InTransit => EventType::InTransit,
            BookingStatus::Delivered => EventType::DeliveryCompleted,
            BookingStatus::Cancelled => EventType::BookingCancelled,
            BookingStatus::Failed => EventType::DeliveryFailed,
        }
    }
}

/// Hint shown next to a booking's history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextExpected {
    BookingConfirmed,
    DriverAssigned,
    PickupCompleted,
    DeliveryCompleted,
    Completed,
    None,
    RetryDelivery,
}

pub fn ensure_transition(from: BookingStatus, to: BookingStatus) -> Result<(), AppError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::PreconditionViolation(format!(
            "illegal transition from {from} to {to}"
        )))
    }
}

/// Event types a scanner may submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    PickupCompleted,
    DeliveryCompleted,
    HubArrival,
    HubDeparture,
    ScanEvent,
    PickupAttempted,
    DeliveryAttempted,
    DeliveryFailed,
    Exception,
}

pub const SCAN_KINDS: [ScanKind; 9] = [
    ScanKind::PickupCompleted,
    ScanKind::DeliveryCompleted,
    ScanKind::HubArrival,
    ScanKind::HubDeparture,
    ScanKind::ScanEvent,
    ScanKind::PickupAttempted,
    ScanKind::DeliveryAttempted,
    ScanKind::DeliveryFailed,
    ScanKind::Exception,
];

impl TryFrom<EventType> for ScanKind {
    type Error = AppError;

    fn try_from(event_type: EventType) -> Result<Self, Self::Error> {
        match event_type {
            EventType::PickupCompleted => Ok(ScanKind::PickupCompleted),
            EventType::DeliveryCompleted => Ok(ScanKind::DeliveryCompleted),
            EventType::HubArrival => Ok(ScanKind::HubArrival),
            EventType::HubDeparture => Ok(ScanKind::HubDeparture),
            EventType::ScanEvent => Ok(ScanKind::ScanEvent),
            EventType::PickupAttempted => Ok(ScanKind::PickupAttempted),
            EventType::DeliveryAttempted => Ok(ScanKind::DeliveryAttempted),
            EventType::DeliveryFailed => Ok(ScanKind::DeliveryFailed),
            EventType::Exception => Ok(ScanKind::Exception),
            other => Err(AppError::BadRequest(format!(
                "{other} cannot be submitted as a scan"
            ))),
        }
    }
}

/// Free-form scan fields used to build the event description.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanContext<'a> {
    pub location: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// What a scan does to the booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEffect {
    /// Logged only, status unchanged.
    Stay,
    MoveTo(BookingStatus),
}

pub struct ScanHandler {
    pub describe: fn(&ScanContext<'_>) -> String,
    pub apply: fn(BookingStatus) -> Result<ScanEffect, AppError>,
}

impl ScanKind {
    pub fn event_type(&self) -> EventType {
        match self {
            ScanKind::PickupCompleted => EventType::PickupCompleted,
            ScanKind::DeliveryCompleted => EventType::DeliveryCompleted,
            ScanKind::HubArrival => EventType::HubArrival,
            ScanKind::HubDeparture => EventType::HubDeparture,
            ScanKind::ScanEvent => EventType::ScanEvent,
            ScanKind::PickupAttempted => EventType::PickupAttempted,
            ScanKind::DeliveryAttempted => EventType::DeliveryAttempted,
            ScanKind::DeliveryFailed => EventType::DeliveryFailed,
            ScanKind::Exception => EventType::Exception,
        }
    }

    pub fn handler(&self) -> ScanHandler {
        match self {
            ScanKind::PickupCompleted => ScanHandler {
                describe: |ctx| {
                    format!("Package picked up from {}", ctx.location.unwrap_or("pickup location"))
                },
                apply: |status| move_to(status, BookingStatus::InTransit),
            },
            ScanKind::DeliveryCompleted => ScanHandler {
                describe: |ctx| {
                    format!("Package delivered to {}", ctx.location.unwrap_or("delivery location"))
                },
                apply: |status| move_to(status, BookingStatus::Delivered),
            },
            ScanKind::HubArrival => ScanHandler {
                describe: |ctx| with_suffix("Package arrived at hub", " - ", ctx.location),
                apply: in_transit_scan,
            },
            ScanKind::HubDeparture => ScanHandler {
                describe: |ctx| with_suffix("Package departed from hub", " - ", ctx.location),
                apply: in_transit_scan,
            },
            ScanKind::ScanEvent => ScanHandler {
                describe: |ctx| with_suffix("Package scanned", " at ", ctx.location),
                apply: in_transit_scan,
            },
            ScanKind::PickupAttempted => ScanHandler {
                describe: |ctx| with_suffix("Pickup attempted", " at ", ctx.location),
                apply: informational,
            },
            ScanKind::DeliveryAttempted => ScanHandler {
                describe: |ctx| with_suffix("Delivery attempted", " at ", ctx.location),
                apply: informational,
            },
            ScanKind::DeliveryFailed => ScanHandler {
                describe: |ctx| with_suffix("Delivery failed", " - ", ctx.notes),
                apply: |status| move_to(status, BookingStatus::Failed),
            },
            ScanKind::Exception => ScanHandler {
                describe: |ctx| with_suffix("Exception occurred", " - ", ctx.notes),
                apply: informational,
            },
        }
    }
}

fn with_suffix(base: &str, separator: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("{base}{separator}{detail}"),
        None => base.to_string(),
    }
}

fn move_to(from: BookingStatus, to: BookingStatus) -> Result<ScanEffect, AppError> {
    ensure_transition(from, to).map(|()| ScanEffect::MoveTo(to))
}

fn in_transit_scan(status: BookingStatus) -> Result<ScanEffect, AppError> {
    match status {
        BookingStatus::Assigned => Ok(ScanEffect::MoveTo(BookingStatus::InTransit)),
        BookingStatus::InTransit => Ok(ScanEffect::Stay),
        other => Err(AppError::PreconditionViolation(format!(
            "transit scans need an assigned or in-transit booking, found {other}"
        ))),
    }
}

fn informational(_status: BookingStatus) -> Result<ScanEffect, AppError> {
    Ok(ScanEffect::Stay)
}

#[cfg(test)]
mod tests {
    use super::{NextExpected, ScanContext, ScanEffect, ScanKind, SCAN_KINDS};
    use crate::error::AppError;
    use crate::models::booking::BookingStatus;
    use crate::models::booking::BookingStatus::*;
    use crate::models::event::EventType;

    const ALL: [BookingStatus; 7] = [
        Pending, Confirmed, Assigned, InTransit, Delivered, Cancelled, Failed,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Delivered, Cancelled, Failed] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn happy_path_moves_forward_only() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));

        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!InTransit.can_transition_to(Assigned));
        assert!(!Assigned.can_transition_to(Delivered));
        assert!(!Pending.can_transition_to(Assigned));
    }

    #[test]
    fn every_live_state_can_be_cancelled_or_failed() {
        for from in [Pending, Confirmed, Assigned, InTransit] {
            assert!(from.can_transition_to(Cancelled));
            assert!(from.can_transition_to(Failed));
        }
    }

    #[test]
    fn driver_is_only_allowed_after_assignment() {
        for status in [Pending, Confirmed, Cancelled] {
            assert!(!status.allows_driver());
        }
        for status in [Assigned, InTransit, Delivered, Failed] {
            assert!(status.allows_driver());
        }
    }

    #[test]
    fn next_expected_hint_follows_status() {
        assert_eq!(Pending.next_expected(), NextExpected::BookingConfirmed);
        assert_eq!(InTransit.next_expected(), NextExpected::DeliveryCompleted);
        assert_eq!(Delivered.next_expected(), NextExpected::Completed);
        assert_eq!(Cancelled.next_expected(), NextExpected::None);
        assert_eq!(Failed.next_expected(), NextExpected::RetryDelivery);
    }

    #[test]
    fn every_scan_kind_round_trips_through_its_event_type() {
        for kind in SCAN_KINDS {
            assert_eq!(ScanKind::try_from(kind.event_type()).unwrap(), kind);
        }
        assert!(matches!(
            ScanKind::try_from(EventType::DriverAssigned),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn pickup_scan_requires_an_assigned_booking() {
        let handler = ScanKind::PickupCompleted.handler();
        assert_eq!((handler.apply)(Assigned).unwrap(), ScanEffect::MoveTo(InTransit));
        assert!(matches!(
            (handler.apply)(Confirmed),
            Err(AppError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn delivery_completed_requires_in_transit() {
        let handler = ScanKind::DeliveryCompleted.handler();
        assert_eq!((handler.apply)(InTransit).unwrap(), ScanEffect::MoveTo(Delivered));
        assert!((handler.apply)(Assigned).is_err());
        assert!((handler.apply)(Failed).is_err());
    }

    #[test]
    fn delivery_failed_is_rejected_once_terminal() {
        let handler = ScanKind::DeliveryFailed.handler();
        assert_eq!((handler.apply)(Pending).unwrap(), ScanEffect::MoveTo(Failed));
        assert_eq!((handler.apply)(InTransit).unwrap(), ScanEffect::MoveTo(Failed));
        assert!((handler.apply)(Delivered).is_err());
    }

    #[test]
    fn hub_scans_promote_assigned_and_keep_in_transit() {
        for kind in [ScanKind::HubArrival, ScanKind::HubDeparture, ScanKind::ScanEvent] {
            let handler = kind.handler();
            assert_eq!((handler.apply)(Assigned).unwrap(), ScanEffect::MoveTo(InTransit));
            assert_eq!((handler.apply)(InTransit).unwrap(), ScanEffect::Stay);
            assert!((handler.apply)(Confirmed).is_err());
        }
    }

    #[test]
    fn attempts_are_informational_in_any_state() {
        for kind in [ScanKind::PickupAttempted, ScanKind::DeliveryAttempted, ScanKind::Exception] {
            for status in ALL {
                assert_eq!((kind.handler().apply)(status).unwrap(), ScanEffect::Stay);
            }
        }
    }

    #[test]
    fn descriptions_use_location_and_notes() {
        let ctx = ScanContext {
            location: Some("Koramangala hub"),
            notes: Some("customer absent"),
        };
        let empty = ScanContext::default();

        assert_eq!(
            (ScanKind::HubArrival.handler().describe)(&ctx),
            "Package arrived at hub - Koramangala hub"
        );
        assert_eq!(
            (ScanKind::PickupCompleted.handler().describe)(&empty),
            "Package picked up from pickup location"
        );
        assert_eq!(
            (ScanKind::DeliveryFailed.handler().describe)(&ctx),
            "Delivery failed - customer absent"
        );
        assert_eq!((ScanKind::ScanEvent.handler().describe)(&empty), "Package scanned");
    }
}
