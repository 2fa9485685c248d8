//! In-process stores backed by `DashMap`.
//!
//! Not durable: everything is lost when the process exits. Listing order is
//! made deterministic (by creation time or id) so matching and sweeps do not
//! depend on hash iteration order.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{BookingStore, DriverStore, EventStore, HubStore, StoreResult};
use crate::geo::haversine_km;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::driver::{Driver, GeoPoint};
use crate::models::event::ShipmentEvent;
use crate::models::hub::Hub;

#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: DashMap<Uuid, Booking>,
    by_number: DashMap<String, Uuid>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, keep: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        bookings
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.bookings.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_by_number(&self, booking_number: &str) -> StoreResult<Option<Booking>> {
        let Some(id) = self.by_number.get(booking_number).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.bookings.get(&id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, booking: &Booking) -> StoreResult<()> {
        self.by_number
            .insert(booking.booking_number.clone(), booking.id);
        self.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn list_unassigned_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        Ok(self.collect(|booking| booking.status == status && booking.driver_id.is_none()))
    }

    async fn list_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        Ok(self.collect(|booking| booking.status == status))
    }

    async fn list_by_requester(&self, requester_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(self.collect(|booking| booking.requester_id == requester_id))
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.bookings.len())
    }
}

#[derive(Default)]
pub struct InMemoryDriverStore {
    drivers: DashMap<Uuid, Driver>,
}

impl InMemoryDriverStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverStore for InMemoryDriverStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Driver>> {
        Ok(self.drivers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_available_verified(&self) -> StoreResult<Vec<Driver>> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().is_eligible())
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by_key(|driver| driver.id);
        Ok(drivers)
    }

    async fn list(&self) -> StoreResult<Vec<Driver>> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by_key(|driver| driver.id);
        Ok(drivers)
    }

    async fn save(&self, driver: &Driver) -> StoreResult<()> {
        self.drivers.insert(driver.id, driver.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryHubStore {
    hubs: DashMap<Uuid, Hub>,
}

impl InMemoryHubStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HubStore for InMemoryHubStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Hub>> {
        Ok(self.hubs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn nearest_active(&self, point: GeoPoint) -> StoreResult<Vec<Hub>> {
        let mut ranked: Vec<(f64, Hub)> = self
            .hubs
            .iter()
            .filter(|entry| entry.value().active)
            .filter_map(|entry| {
                let hub = entry.value();
                hub.location
                    .map(|location| (haversine_km(&location, &point), hub.clone()))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        Ok(ranked.into_iter().map(|(_, hub)| hub).collect())
    }

    async fn list(&self) -> StoreResult<Vec<Hub>> {
        let mut hubs: Vec<Hub> = self.hubs.iter().map(|entry| entry.value().clone()).collect();
        hubs.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(hubs)
    }

    async fn save(&self, hub: &Hub) -> StoreResult<()> {
        self.hubs.insert(hub.id, hub.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEventStore {
    by_booking: DashMap<Uuid, Vec<ShipmentEvent>>,
    booking_of: DashMap<Uuid, Uuid>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first; events sharing a timestamp keep reverse append order.
fn newest_first(events: impl DoubleEndedIterator<Item = ShipmentEvent>) -> Vec<ShipmentEvent> {
    let mut events: Vec<ShipmentEvent> = events.rev().collect();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: &ShipmentEvent) -> StoreResult<()> {
        self.by_booking
            .entry(event.booking_id)
            .or_default()
            .push(event.clone());
        self.booking_of.insert(event.id, event.booking_id);
        Ok(())
    }

    async fn list_by_booking(&self, booking_id: Uuid) -> StoreResult<Vec<ShipmentEvent>> {
        let events = self
            .by_booking
            .get(&booking_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        Ok(newest_first(events.into_iter()))
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<ShipmentEvent>> {
        let Some(booking_id) = self.booking_of.get(&id).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.by_booking.get(&booking_id).and_then(|entry| {
            entry
                .value()
                .iter()
                .find(|event| event.id == id)
                .cloned()
        }))
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<ShipmentEvent>> {
        let all: Vec<ShipmentEvent> = self
            .by_booking
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        let mut events = newest_first(all.into_iter());
        events.truncate(limit);
        Ok(events)
    }
}
