use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::journal::{EventDetails, EventJournal};
use crate::engine::locks::{KeyedGuard, KeyedLocks};
use crate::engine::scoring::{Candidate, MatchingEngine};
use crate::engine::state_machine::ensure_transition;
use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::{Driver, DriverRegistration, DriverStatus, GeoPoint};
use crate::models::event::EventType;
use crate::models::hub::{Hub, HubRegistration};
use crate::observability::metrics::Metrics;
use crate::store::{BookingStore, DriverStore, HubStore};

/// Owns every booking/driver binding change.
///
/// Booking-scoped work runs under the booking's lock and driver status flips
/// under the driver's lock (always acquired in that order), so a driver is
/// never claimed twice and a booking never gets two drivers.
pub struct AssignmentCoordinator {
    bookings: Arc<dyn BookingStore>,
    drivers: Arc<dyn DriverStore>,
    hubs: Arc<dyn HubStore>,
    journal: Arc<EventJournal>,
    matcher: MatchingEngine,
    metrics: Arc<Metrics>,
    booking_locks: KeyedLocks,
    driver_locks: KeyedLocks,
}

impl AssignmentCoordinator {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        drivers: Arc<dyn DriverStore>,
        hubs: Arc<dyn HubStore>,
        journal: Arc<EventJournal>,
        matcher: MatchingEngine,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            bookings,
            drivers,
            hubs,
            journal,
            matcher,
            metrics,
            booking_locks: KeyedLocks::new(),
            driver_locks: KeyedLocks::new(),
        }
    }

    /// Serializes all state changes of one booking.
    pub async fn lock_booking(&self, booking_id: Uuid) -> KeyedGuard<'_> {
        self.booking_locks.lock(booking_id).await
    }

    pub async fn assign(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let start = Instant::now();
        let result = self.assign_locked(booking_id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        self.metrics
            .record_assignment(outcome, start.elapsed().as_secs_f64());

        result
    }

    async fn assign_locked(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let _booking_guard = self.lock_booking(booking_id).await;
        let mut booking = self.load_booking(booking_id).await?;

        if let Some(driver_id) = booking.driver_id {
            return Err(AppError::PreconditionViolation(format!(
                "booking {} already has driver {driver_id} assigned",
                booking.booking_number
            )));
        }
        ensure_transition(booking.status, BookingStatus::Assigned)?;

        let mut candidates = self.candidates().await?;
        self.metrics.eligible_drivers.set(candidates.len() as i64);

        let (driver, matched) = loop {
            let Some(matched) = self.matcher.select_driver(&booking, &candidates) else {
                warn!(booking_id = %booking.id, "no eligible driver for booking");
                return Err(AppError::NoEligibleDriver);
            };

            match self.claim_driver(matched.driver_id, booking.id).await? {
                Some(driver) => break (driver, matched),
                None => {
                    debug!(
                        booking_id = %booking.id,
                        driver_id = %matched.driver_id,
                        "driver no longer eligible; re-ranking"
                    );
                    candidates.retain(|candidate| candidate.driver.id != matched.driver_id);
                }
            }
        };

        booking.driver_id = Some(driver.id);
        booking.status = BookingStatus::Assigned;
        booking.updated_at = Utc::now();

        if let Err(err) = self.bookings.save(&booking).await {
            self.unclaim_driver(driver.id, booking.id).await;
            return Err(err);
        }

        self.journal
            .record(
                &booking,
                EventType::DriverAssigned,
                format!("Driver {} assigned to booking", driver.name),
                EventDetails {
                    notes: Some(format!(
                        "match score {:.3} (rating {:.3}, experience {:.3}, proximity {:.3}, hub {:.3})",
                        matched.score,
                        matched.score_breakdown.rating_score,
                        matched.score_breakdown.experience_score,
                        matched.score_breakdown.proximity_score,
                        matched.score_breakdown.hub_score,
                    )),
                    ..EventDetails::default()
                },
            )
            .await?;

        info!(
            booking_id = %booking.id,
            driver_id = %driver.id,
            score = matched.score,
            breakdown = ?matched.score_breakdown,
            "driver assigned"
        );

        Ok(booking)
    }

    /// Available verified drivers with their home-hub coordinates resolved.
    async fn candidates(&self) -> Result<Vec<Candidate>, AppError> {
        let drivers = self.drivers.list_available_verified().await?;
        let mut hub_locations: HashMap<Uuid, Option<GeoPoint>> = HashMap::new();
        let mut candidates = Vec::with_capacity(drivers.len());

        for driver in drivers {
            let hub_location = match driver.hub_id {
                Some(hub_id) => match hub_locations.get(&hub_id) {
                    Some(location) => *location,
                    None => {
                        let location = self.hubs.get(hub_id).await?.and_then(|hub| hub.location);
                        hub_locations.insert(hub_id, location);
                        location
                    }
                },
                None => None,
            };
            candidates.push(Candidate {
                driver,
                hub_location,
            });
        }

        Ok(candidates)
    }

    /// Flips the driver to `Busy` if it is still eligible; `None` if someone got there first.
    async fn claim_driver(&self, driver_id: Uuid, booking_id: Uuid) -> Result<Option<Driver>, AppError> {
        let _driver_guard = self.driver_locks.lock(driver_id).await;

        let Some(mut driver) = self.drivers.get(driver_id).await? else {
            return Ok(None);
        };
        if !driver.is_eligible() {
            return Ok(None);
        }

        driver.status = DriverStatus::Busy;
        driver.current_booking = Some(booking_id);
        driver.updated_at = Utc::now();
        self.drivers.save(&driver).await?;

        Ok(Some(driver))
    }

    async fn unclaim_driver(&self, driver_id: Uuid, booking_id: Uuid) {
        let _driver_guard = self.driver_locks.lock(driver_id).await;

        let driver = match self.drivers.get(driver_id).await {
            Ok(Some(driver)) => driver,
            Ok(None) => return,
            Err(err) => {
                error!(driver_id = %driver_id, error = %err, "failed to load driver for rollback");
                return;
            }
        };
        if driver.current_booking != Some(booking_id) {
            return;
        }

        let mut driver = driver;
        driver.status = DriverStatus::Available;
        driver.current_booking = None;
        driver.updated_at = Utc::now();
        if let Err(err) = self.drivers.save(&driver).await {
            error!(driver_id = %driver_id, error = %err, "failed to roll back driver claim");
        }
    }

    /// Records the nearest active hubs for pickup and delivery. Safe to repeat.
    pub async fn assign_hubs(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let _booking_guard = self.lock_booking(booking_id).await;
        let mut booking = self.load_booking(booking_id).await?;

        if let Some(pickup) = booking.pickup {
            if let Some(hub) = self.hubs.nearest_active(pickup).await?.into_iter().next() {
                booking.pickup_hub_id = Some(hub.id);
            }
        }
        if let Some(delivery) = booking.delivery {
            if let Some(hub) = self.hubs.nearest_active(delivery).await?.into_iter().next() {
                booking.delivery_hub_id = Some(hub.id);
            }
        }

        booking.updated_at = Utc::now();
        self.bookings.save(&booking).await?;

        info!(
            booking_id = %booking.id,
            pickup_hub = ?booking.pickup_hub_id,
            delivery_hub = ?booking.delivery_hub_id,
            "hubs assigned"
        );

        Ok(booking)
    }

    /// Frees the driver of a finished booking. Live bookings keep their driver.
    pub async fn release(&self, booking_id: Uuid) -> Result<(), AppError> {
        let _booking_guard = self.lock_booking(booking_id).await;
        let booking = self.load_booking(booking_id).await?;

        if !booking.status.is_terminal() {
            return Err(AppError::PreconditionViolation(format!(
                "booking {} is {}; only finished bookings release their driver",
                booking.booking_number, booking.status
            )));
        }

        self.release_driver(&booking).await?;
        Ok(())
    }

    /// Frees the driver bound to `booking`. The caller holds the booking lock.
    ///
    /// A driver that has already moved on (released earlier, or bound to a
    /// different booking) is left untouched. Deliveries are counted only when
    /// the booking is `Delivered`.
    pub(crate) async fn release_driver(&self, booking: &Booking) -> Result<Option<Driver>, AppError> {
        let Some(driver_id) = booking.driver_id else {
            return Ok(None);
        };

        let _driver_guard = self.driver_locks.lock(driver_id).await;
        let mut driver = self
            .drivers
            .get(driver_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        if driver.current_booking != Some(booking.id) {
            debug!(
                booking_id = %booking.id,
                driver_id = %driver_id,
                "driver already released from booking"
            );
            return Ok(None);
        }

        driver.status = DriverStatus::Available;
        driver.current_booking = None;
        if booking.status == BookingStatus::Delivered {
            driver.total_deliveries = driver.total_deliveries.saturating_add(1);
            if booking.delivery_hub_id.is_some() {
                driver.current_hub_id = booking.delivery_hub_id;
            }
        }
        driver.updated_at = Utc::now();
        self.drivers.save(&driver).await?;

        info!(
            booking_id = %booking.id,
            driver_id = %driver_id,
            status = %booking.status,
            total_deliveries = driver.total_deliveries,
            "driver released"
        );

        Ok(Some(driver))
    }

    pub async fn register_driver(&self, registration: DriverRegistration) -> Result<Driver, AppError> {
        if registration.name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }
        if registration.license_number.trim().is_empty() {
            return Err(AppError::BadRequest(
                "license number cannot be empty".to_string(),
            ));
        }
        if let Some(hub_id) = registration.hub_id {
            if self.hubs.get(hub_id).await?.is_none() {
                return Err(AppError::BadRequest(format!("hub {hub_id} does not exist")));
            }
        }

        let driver = Driver {
            id: Uuid::new_v4(),
            name: registration.name,
            license_number: registration.license_number,
            vehicle_type: registration.vehicle_type,
            status: DriverStatus::Available,
            verified: registration.verified,
            hub_id: registration.hub_id,
            current_hub_id: registration.hub_id,
            rating: registration.rating.map(|rating| rating.clamp(0.0, 5.0)),
            total_deliveries: 0,
            current_booking: None,
            updated_at: Utc::now(),
        };
        self.drivers.save(&driver).await?;

        info!(driver_id = %driver.id, verified = driver.verified, "driver registered");
        Ok(driver)
    }

    /// Manual availability changes. `Busy` belongs to assignment and cannot be set or cleared here.
    pub async fn set_driver_status(&self, driver_id: Uuid, status: DriverStatus) -> Result<Driver, AppError> {
        let _driver_guard = self.driver_locks.lock(driver_id).await;
        let mut driver = self.load_driver(driver_id).await?;

        if status == DriverStatus::Busy || driver.status == DriverStatus::Busy {
            return Err(AppError::PreconditionViolation(format!(
                "driver {driver_id} is {:?}; busy status is managed by assignment",
                driver.status
            )));
        }

        driver.status = status;
        driver.updated_at = Utc::now();
        self.drivers.save(&driver).await?;
        Ok(driver)
    }

    pub async fn set_driver_verified(&self, driver_id: Uuid, verified: bool) -> Result<Driver, AppError> {
        let _driver_guard = self.driver_locks.lock(driver_id).await;
        let mut driver = self.load_driver(driver_id).await?;

        driver.verified = verified;
        driver.updated_at = Utc::now();
        self.drivers.save(&driver).await?;
        Ok(driver)
    }

    pub async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        self.drivers.list().await
    }

    pub async fn register_hub(&self, registration: HubRegistration) -> Result<Hub, AppError> {
        if registration.name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }
        if registration.location.is_some_and(|location| !location.is_valid()) {
            return Err(AppError::BadRequest(
                "hub coordinates are out of range".to_string(),
            ));
        }

        let hub = Hub {
            id: Uuid::new_v4(),
            name: registration.name,
            address: registration.address,
            city: registration.city,
            location: registration.location,
            active: true,
            created_at: Utc::now(),
        };
        self.hubs.save(&hub).await?;

        info!(hub_id = %hub.id, name = %hub.name, "hub registered");
        Ok(hub)
    }

    pub async fn list_hubs(&self) -> Result<Vec<Hub>, AppError> {
        self.hubs.list().await
    }

    async fn load_booking(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))
    }

    async fn load_driver(&self, driver_id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(driver_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
    }
}
