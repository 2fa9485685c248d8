//! Persistence boundary of the dispatch core.
//!
//! The engine only talks to these traits. Lookups return `Ok(None)` for an
//! expected miss and reserve `Err` for store failures, so callers can tell
//! "booking does not exist" apart from "database is down".
//!
//! [`memory`] holds the in-process implementations used by the binary and the
//! tests. A SQL-backed implementation plugs in behind the same traits.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::{Driver, GeoPoint};
use crate::models::event::ShipmentEvent;
use crate::models::hub::Hub;

pub type StoreResult<T> = Result<T, AppError>;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn get_by_number(&self, booking_number: &str) -> StoreResult<Option<Booking>>;

    /// Inserts or replaces the booking keyed by its id.
    async fn save(&self, booking: &Booking) -> StoreResult<()>;

    /// Bookings in `status` with no driver bound, oldest first.
    async fn list_unassigned_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>>;

    async fn list_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>>;

    async fn list_by_requester(&self, requester_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn count(&self) -> StoreResult<usize>;
}

#[async_trait]
pub trait DriverStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Driver>>;

    /// Drivers that are `Available` and verified, in ascending id order.
    async fn list_available_verified(&self) -> StoreResult<Vec<Driver>>;

    async fn list(&self) -> StoreResult<Vec<Driver>>;

    async fn save(&self, driver: &Driver) -> StoreResult<()>;
}

#[async_trait]
pub trait HubStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Hub>>;

    /// Active hubs with known coordinates, nearest to `point` first.
    async fn nearest_active(&self, point: GeoPoint) -> StoreResult<Vec<Hub>>;

    async fn list(&self) -> StoreResult<Vec<Hub>>;

    async fn save(&self, hub: &Hub) -> StoreResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &ShipmentEvent) -> StoreResult<()>;

    /// Events of one booking, newest first.
    async fn list_by_booking(&self, booking_id: Uuid) -> StoreResult<Vec<ShipmentEvent>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<ShipmentEvent>>;

    /// Newest events across all bookings.
    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<ShipmentEvent>>;
}

/// The set of collaborators the engine is wired against.
#[derive(Clone)]
pub struct Stores {
    pub bookings: Arc<dyn BookingStore>,
    pub drivers: Arc<dyn DriverStore>,
    pub hubs: Arc<dyn HubStore>,
    pub events: Arc<dyn EventStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            bookings: Arc::new(memory::InMemoryBookingStore::new()),
            drivers: Arc::new(memory::InMemoryDriverStore::new()),
            hubs: Arc::new(memory::InMemoryHubStore::new()),
            events: Arc::new(memory::InMemoryEventStore::new()),
        }
    }
}
