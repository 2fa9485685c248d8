use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::journal::{EventDetails, EventJournal};
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::actor::Actor;
use crate::models::booking::{Booking, BookingStatus, NewBooking};
use crate::models::event::EventType;
use crate::pricing::PricingOracle;
use crate::store::BookingStore;

const BOOKING_NUMBER_PREFIX: &str = "DWZ";
const BOOKING_NUMBER_ATTEMPTS: usize = 5;

/// Booking intake and read access.
pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    journal: Arc<EventJournal>,
    pricing: Arc<dyn PricingOracle>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        journal: Arc<EventJournal>,
        pricing: Arc<dyn PricingOracle>,
    ) -> Self {
        Self {
            bookings,
            journal,
            pricing,
        }
    }

    pub async fn create(&self, request: NewBooking, requester: Actor) -> Result<Booking, AppError> {
        validate(&request)?;

        let distance_km = match (request.pickup, request.delivery) {
            (Some(pickup), Some(delivery)) => Some(haversine_km(&pickup, &delivery)),
            _ => None,
        };
        let total_price = self.pricing.quote(&request, distance_km).await?;
        let booking_number = self.unique_booking_number().await?;

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            booking_number,
            requester_id: requester.id,
            driver_id: None,
            pickup_hub_id: None,
            delivery_hub_id: None,
            pickup_address: request.pickup_address,
            delivery_address: request.delivery_address,
            pickup: request.pickup,
            delivery: request.delivery,
            status: BookingStatus::Pending,
            scheduled_pickup_at: request.scheduled_pickup_at,
            scheduled_delivery_at: request.scheduled_delivery_at,
            actual_pickup_at: None,
            actual_delivery_at: None,
            total_price,
            distance_km,
            special_instructions: request.special_instructions,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        self.bookings.save(&booking).await?;
        self.journal
            .record(
                &booking,
                EventType::BookingCreated,
                "Booking created successfully",
                EventDetails::by(requester),
            )
            .await?;

        info!(
            booking_id = %booking.id,
            booking_number = %booking.booking_number,
            total_price = booking.total_price,
            "booking created"
        );

        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))
    }

    pub async fn get_by_number(&self, booking_number: &str) -> Result<Booking, AppError> {
        self.bookings
            .get_by_number(booking_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_number} not found")))
    }

    pub async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_by_status(status).await
    }

    pub async fn list_for_requester(&self, requester_id: Uuid) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_by_requester(requester_id).await
    }

    async fn unique_booking_number(&self) -> Result<String, AppError> {
        for _ in 0..BOOKING_NUMBER_ATTEMPTS {
            let candidate = generate_booking_number();
            if self.bookings.get_by_number(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(AppError::Internal(
            "could not generate a unique booking number".to_string(),
        ))
    }
}

fn validate(request: &NewBooking) -> Result<(), AppError> {
    if request.pickup_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "pickup address cannot be empty".to_string(),
        ));
    }
    if request.delivery_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "delivery address cannot be empty".to_string(),
        ));
    }
    for (name, point) in [("pickup", request.pickup), ("delivery", request.delivery)] {
        if point.is_some_and(|point| !point.is_valid()) {
            return Err(AppError::BadRequest(format!(
                "{name} coordinates are out of range"
            )));
        }
    }
    Ok(())
}

/// `DWZ` + last six digits of the millisecond clock + eight random hex digits.
fn generate_booking_number() -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let clock = &millis[millis.len().saturating_sub(6)..];
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{BOOKING_NUMBER_PREFIX}{clock}{}",
        random[..8].to_ascii_uppercase()
    )
}
