use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use booking_dispatch::config::Config;
use booking_dispatch::error::AppError;
use booking_dispatch::models::actor::{Actor, Role};
use booking_dispatch::models::booking::{Booking, BookingStatus, NewBooking};
use booking_dispatch::models::driver::{Driver, DriverRegistration, DriverStatus, GeoPoint};
use booking_dispatch::models::event::{EventType, ScanRequest};
use booking_dispatch::state::AppState;
use booking_dispatch::store::memory::{InMemoryBookingStore, InMemoryDriverStore};
use booking_dispatch::store::{BookingStore, DriverStore, StoreResult, Stores};
use uuid::Uuid;

fn setup() -> Arc<AppState> {
    Arc::new(AppState::new(&Config::default()))
}

fn admin() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Admin)
}

fn customer() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Customer)
}

fn as_driver(driver: &Driver) -> Actor {
    Actor::new(driver.id, Role::Driver)
}

fn new_booking() -> NewBooking {
    NewBooking {
        pickup_address: "Jl. Sudirman 1".to_string(),
        delivery_address: "Jl. Thamrin 10".to_string(),
        pickup: Some(GeoPoint {
            lat: -6.2088,
            lng: 106.8456,
        }),
        delivery: Some(GeoPoint {
            lat: -6.1944,
            lng: 106.8229,
        }),
        scheduled_pickup_at: None,
        scheduled_delivery_at: None,
        special_instructions: None,
        notes: None,
    }
}

async fn add_driver(state: &AppState, name: &str) -> Driver {
    state
        .coordinator
        .register_driver(DriverRegistration {
            name: name.to_string(),
            license_number: format!("B-{name}"),
            vehicle_type: Some("VAN".to_string()),
            hub_id: None,
            rating: Some(4.0),
            verified: true,
        })
        .await
        .unwrap()
}

async fn confirmed_booking(state: &AppState) -> Booking {
    let booking = state.bookings.create(new_booking(), customer()).await.unwrap();
    state.lifecycle.confirm(booking.id, admin()).await.unwrap()
}

async fn scan(state: &AppState, booking: &Booking, kind: EventType, actor: Actor) -> Result<(), AppError> {
    state
        .lifecycle
        .process_scan(ScanRequest::new(booking.booking_number.clone(), kind), actor)
        .await
        .map(|_| ())
}

async fn driver(state: &AppState, id: Uuid) -> Driver {
    state.stores.drivers.get(id).await.unwrap().unwrap()
}

async fn assert_driver_invariant(state: &AppState) {
    for status in [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Assigned,
        BookingStatus::InTransit,
        BookingStatus::Delivered,
        BookingStatus::Cancelled,
        BookingStatus::Failed,
    ] {
        for booking in state.bookings.list_by_status(status).await.unwrap() {
            if booking.driver_id.is_some() {
                assert!(
                    status.allows_driver(),
                    "booking {} is {status} with a driver bound",
                    booking.booking_number
                );
            }
        }
    }
}

#[tokio::test]
async fn assignment_binds_driver_and_marks_busy() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;

    let assigned = state.coordinator.assign(booking.id).await.unwrap();

    assert_eq!(assigned.status, BookingStatus::Assigned);
    assert_eq!(assigned.driver_id, Some(d.id));
    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Busy);
    assert_eq!(d.current_booking, Some(booking.id));
    assert_driver_invariant(&state).await;
}

#[tokio::test]
async fn second_assignment_is_a_precondition_violation() {
    let state = setup();
    add_driver(&state, "Budi").await;
    add_driver(&state, "Siti").await;
    let booking = confirmed_booking(&state).await;

    state.coordinator.assign(booking.id).await.unwrap();
    let err = state.coordinator.assign(booking.id).await.unwrap_err();

    assert!(matches!(err, AppError::PreconditionViolation(_)));
    let busy = state
        .coordinator
        .list_drivers()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.status == DriverStatus::Busy)
        .count();
    assert_eq!(busy, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assignment_of_one_booking_binds_exactly_one_driver() {
    let state = setup();
    for name in ["a", "b", "c"] {
        add_driver(&state, name).await;
    }
    let booking = confirmed_booking(&state).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { state.coordinator.assign(booking.id).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert!(matches!(err, AppError::PreconditionViolation(_))),
        }
    }

    assert_eq!(successes, 1);
    let busy = state
        .coordinator
        .list_drivers()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.status == DriverStatus::Busy)
        .count();
    assert_eq!(busy, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_never_share_a_driver() {
    let state = setup();
    for name in ["a", "b", "c"] {
        add_driver(&state, name).await;
    }
    let mut bookings = Vec::new();
    for _ in 0..5 {
        bookings.push(confirmed_booking(&state).await);
    }

    let handles: Vec<_> = bookings
        .iter()
        .map(|booking| {
            let state = state.clone();
            let id = booking.id;
            tokio::spawn(async move { state.coordinator.assign(id).await })
        })
        .collect();

    let mut assigned_drivers = Vec::new();
    let mut no_driver = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(booking) => assigned_drivers.push(booking.driver_id.unwrap()),
            Err(AppError::NoEligibleDriver) => no_driver += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(assigned_drivers.len(), 3);
    assert_eq!(no_driver, 2);
    assigned_drivers.sort();
    assigned_drivers.dedup();
    assert_eq!(assigned_drivers.len(), 3);
    assert_driver_invariant(&state).await;
}

#[tokio::test]
async fn delivery_completed_counts_one_delivery_and_frees_driver() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();

    scan(&state, &booking, EventType::PickupCompleted, as_driver(&d)).await.unwrap();
    scan(&state, &booking, EventType::HubArrival, as_driver(&d)).await.unwrap();
    scan(&state, &booking, EventType::DeliveryCompleted, as_driver(&d)).await.unwrap();

    let booking = state.bookings.get(booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Delivered);
    assert!(booking.actual_pickup_at.is_some());
    assert!(booking.actual_delivery_at.is_some());

    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    assert_eq!(d.total_deliveries, 1);
    assert_eq!(d.current_booking, None);

    // A late release is a no-op.
    state.coordinator.release(booking.id).await.unwrap();
    assert_eq!(driver(&state, d.id).await.total_deliveries, 1);
}

#[tokio::test]
async fn delivery_failed_frees_driver_without_counting() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();
    scan(&state, &booking, EventType::PickupCompleted, as_driver(&d)).await.unwrap();

    scan(&state, &booking, EventType::DeliveryFailed, as_driver(&d)).await.unwrap();

    let booking = state.bookings.get(booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Failed);
    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    assert_eq!(d.total_deliveries, 0);

    let err = scan(&state, &booking, EventType::DeliveryCompleted, admin())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PreconditionViolation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_final_scans_apply_exactly_once() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();
    scan(&state, &booking, EventType::PickupCompleted, as_driver(&d)).await.unwrap();

    let delivered = {
        let state = state.clone();
        let booking = booking.clone();
        let actor = as_driver(&d);
        tokio::spawn(async move { scan(&state, &booking, EventType::DeliveryCompleted, actor).await })
    };
    let failed = {
        let state = state.clone();
        let booking = booking.clone();
        let actor = as_driver(&d);
        tokio::spawn(async move { scan(&state, &booking, EventType::DeliveryFailed, actor).await })
    };

    let delivered = delivered.await.unwrap();
    let failed = failed.await.unwrap();
    assert!(delivered.is_ok() != failed.is_ok());

    let booking = state.bookings.get(booking.id).await.unwrap();
    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    if delivered.is_ok() {
        assert_eq!(booking.status, BookingStatus::Delivered);
        assert_eq!(d.total_deliveries, 1);
    } else {
        assert_eq!(booking.status, BookingStatus::Failed);
        assert_eq!(d.total_deliveries, 0);
    }
}

#[tokio::test]
async fn scan_of_unknown_booking_records_nothing() {
    let state = setup();
    confirmed_booking(&state).await;
    let before = state.journal.recent(100).await.unwrap().len();

    let err = state
        .lifecycle
        .process_scan(ScanRequest::new("DWZ123ABC", EventType::HubArrival), admin())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(state.journal.recent(100).await.unwrap().len(), before);
}

#[tokio::test]
async fn only_the_assigned_driver_or_staff_may_scan() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();

    let err = scan(&state, &booking, EventType::PickupCompleted, customer())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let stranger = Actor::new(Uuid::new_v4(), Role::Driver);
    assert!(
        !state
            .lifecycle
            .validate_scan_permission(&booking.booking_number, &stranger)
            .await
            .unwrap()
    );
    assert!(
        state
            .lifecycle
            .validate_scan_permission(&booking.booking_number, &as_driver(&d))
            .await
            .unwrap()
    );

    let hub_manager = Actor::new(Uuid::new_v4(), Role::HubManager);
    scan(&state, &booking, EventType::PickupCompleted, hub_manager).await.unwrap();
}

#[tokio::test]
async fn cancelling_an_assigned_booking_unbinds_the_driver() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();

    let cancelled = state
        .lifecycle
        .cancel(booking.id, admin(), Some("address unreachable".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.driver_id, None);
    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    assert_eq!(d.total_deliveries, 0);
    assert_driver_invariant(&state).await;

    let history = state.lifecycle.history(&booking.booking_number).await.unwrap();
    assert_eq!(history.events[0].event_type, EventType::BookingCancelled);
    assert_eq!(
        history.events[0].description,
        "Booking cancelled - address unreachable"
    );
}

#[tokio::test]
async fn status_override_follows_the_transition_table() {
    let state = setup();
    let booking = state.bookings.create(new_booking(), customer()).await.unwrap();

    let err = state
        .lifecycle
        .update_status(booking.id, BookingStatus::Delivered, admin())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PreconditionViolation(_)));

    let err = state
        .lifecycle
        .update_status(booking.id, BookingStatus::Confirmed, customer())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let confirmed = state
        .lifecycle
        .update_status(booking.id, BookingStatus::Confirmed, admin())
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let history = state.lifecycle.history(&booking.booking_number).await.unwrap();
    assert_eq!(history.events[0].event_type, EventType::BookingConfirmed);
    assert_eq!(
        history.events[0].description,
        "Booking status changed from PENDING to CONFIRMED"
    );
}

/// Fails `get` or `save` for one booking id; everything else goes to the inner store.
struct FailingBookingStore {
    inner: InMemoryBookingStore,
    fail_on: Mutex<Option<Uuid>>,
    fail_save_on: Mutex<Option<Uuid>>,
}

impl FailingBookingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryBookingStore::new(),
            fail_on: Mutex::new(None),
            fail_save_on: Mutex::new(None),
        }
    }

    fn fail_on(&self, id: Uuid) {
        *self.fail_on.lock().unwrap() = Some(id);
    }

    fn fail_save_on(&self, id: Uuid) {
        *self.fail_save_on.lock().unwrap() = Some(id);
    }
}

#[async_trait]
impl BookingStore for FailingBookingStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        if *self.fail_on.lock().unwrap() == Some(id) {
            return Err(AppError::Internal("storage unavailable".to_string()));
        }
        self.inner.get(id).await
    }

    async fn get_by_number(&self, booking_number: &str) -> StoreResult<Option<Booking>> {
        self.inner.get_by_number(booking_number).await
    }

    async fn save(&self, booking: &Booking) -> StoreResult<()> {
        if *self.fail_save_on.lock().unwrap() == Some(booking.id) {
            return Err(AppError::Internal("storage unavailable".to_string()));
        }
        self.inner.save(booking).await
    }

    async fn list_unassigned_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        self.inner.list_unassigned_by_status(status).await
    }

    async fn list_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        self.inner.list_by_status(status).await
    }

    async fn list_by_requester(&self, requester_id: Uuid) -> StoreResult<Vec<Booking>> {
        self.inner.list_by_requester(requester_id).await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.inner.count().await
    }
}

#[tokio::test]
async fn sweep_continues_past_a_failing_booking() {
    let failing = Arc::new(FailingBookingStore::new());
    let stores = Stores {
        bookings: failing.clone(),
        ..Stores::in_memory()
    };
    let state = AppState::with_stores(&Config::default(), stores);

    for name in ["a", "b", "c"] {
        add_driver(&state, name).await;
    }
    let first = confirmed_booking(&state).await;
    let second = confirmed_booking(&state).await;
    let third = confirmed_booking(&state).await;
    failing.fail_on(second.id);

    let report = state.scheduler.sweep().await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.assigned, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].booking_id, second.id);

    for booking in [&first, &third] {
        let booking = state.stores.bookings.get(booking.id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Assigned);
    }
}

#[tokio::test]
async fn sweep_without_drivers_reports_no_driver() {
    let state = setup();
    confirmed_booking(&state).await;
    state.bookings.create(new_booking(), customer()).await.unwrap();

    let report = state.scheduler.sweep().await.unwrap();

    assert_eq!(report.attempted, 1);
    assert_eq!(report.assigned, 0);
    assert_eq!(report.no_driver, 1);
    assert!(report.failed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_sweeps_until_cancelled() {
    let state = setup();
    add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;

    let cancel = tokio_util::sync::CancellationToken::new();
    let period = state.scheduler.period();
    let handle = tokio::spawn(state.scheduler.clone().run(cancel.clone()));

    tokio::time::sleep(period + std::time::Duration::from_secs(1)).await;
    let assigned = state.bookings.get(booking.id).await.unwrap();
    assert_eq!(assigned.status, BookingStatus::Assigned);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn releasing_a_live_booking_is_rejected() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let first = confirmed_booking(&state).await;
    state.coordinator.assign(first.id).await.unwrap();

    let err = state.coordinator.release(first.id).await.unwrap_err();
    assert!(matches!(err, AppError::PreconditionViolation(_)));

    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Busy);
    assert_eq!(d.current_booking, Some(first.id));

    let second = confirmed_booking(&state).await;
    let err = state.coordinator.assign(second.id).await.unwrap_err();
    assert!(matches!(err, AppError::NoEligibleDriver));

    scan(&state, &first, EventType::PickupCompleted, as_driver(&d)).await.unwrap();
    scan(&state, &first, EventType::DeliveryCompleted, as_driver(&d)).await.unwrap();
    assert_eq!(driver(&state, d.id).await.total_deliveries, 1);
}

#[tokio::test]
async fn status_override_to_delivered_frees_and_counts() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();
    scan(&state, &booking, EventType::PickupCompleted, as_driver(&d)).await.unwrap();

    let delivered = state
        .lifecycle
        .update_status(booking.id, BookingStatus::Delivered, admin())
        .await
        .unwrap();

    assert_eq!(delivered.status, BookingStatus::Delivered);
    assert_eq!(delivered.driver_id, Some(d.id));
    assert!(delivered.actual_delivery_at.is_some());
    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    assert_eq!(d.current_booking, None);
    assert_eq!(d.total_deliveries, 1);
    assert_driver_invariant(&state).await;
}

#[tokio::test]
async fn status_override_to_failed_frees_without_counting() {
    let state = setup();
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();

    let failed = state
        .lifecycle
        .update_status(booking.id, BookingStatus::Failed, admin())
        .await
        .unwrap();

    assert_eq!(failed.status, BookingStatus::Failed);
    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    assert_eq!(d.current_booking, None);
    assert_eq!(d.total_deliveries, 0);
}

#[tokio::test]
async fn failed_booking_save_rolls_back_the_driver_claim() {
    let failing = Arc::new(FailingBookingStore::new());
    let stores = Stores {
        bookings: failing.clone(),
        ..Stores::in_memory()
    };
    let state = AppState::with_stores(&Config::default(), stores);
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    failing.fail_save_on(booking.id);

    let err = state.coordinator.assign(booking.id).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));

    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    assert_eq!(d.current_booking, None);
    let booking = state.stores.bookings.get(booking.id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.driver_id, None);
}

#[tokio::test]
async fn assignment_event_notes_carry_the_score_breakdown() {
    let state = setup();
    add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();

    let history = state.lifecycle.history(&booking.booking_number).await.unwrap();
    let assigned = &history.events[0];
    assert_eq!(assigned.event_type, EventType::DriverAssigned);
    let notes = assigned.notes.as_deref().unwrap();
    // Rating 4.0, no deliveries, no home hub.
    assert!(notes.contains("rating 0.800"), "{notes}");
    assert!(notes.contains("experience 0.000"), "{notes}");
    assert!(notes.contains("proximity 0.500"), "{notes}");
    assert!(notes.contains("hub 0.500"), "{notes}");
}

/// Fails every driver `save` while armed.
#[derive(Default)]
struct FlakyDriverStore {
    inner: InMemoryDriverStore,
    failing: Mutex<bool>,
}

impl FlakyDriverStore {
    fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl DriverStore for FlakyDriverStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Driver>> {
        self.inner.get(id).await
    }

    async fn list_available_verified(&self) -> StoreResult<Vec<Driver>> {
        self.inner.list_available_verified().await
    }

    async fn list(&self) -> StoreResult<Vec<Driver>> {
        self.inner.list().await
    }

    async fn save(&self, driver: &Driver) -> StoreResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::Internal("driver storage unavailable".to_string()));
        }
        self.inner.save(driver).await
    }
}

#[tokio::test]
async fn failed_release_after_delivery_can_be_retried() {
    let drivers = Arc::new(FlakyDriverStore::default());
    let stores = Stores {
        drivers: drivers.clone(),
        ..Stores::in_memory()
    };
    let state = AppState::with_stores(&Config::default(), stores);
    let d = add_driver(&state, "Budi").await;
    let booking = confirmed_booking(&state).await;
    state.coordinator.assign(booking.id).await.unwrap();
    scan(&state, &booking, EventType::PickupCompleted, as_driver(&d)).await.unwrap();

    drivers.set_failing(true);
    let err = scan(&state, &booking, EventType::DeliveryCompleted, as_driver(&d))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(
        state.bookings.get(booking.id).await.unwrap().status,
        BookingStatus::Delivered
    );
    assert_eq!(driver(&state, d.id).await.status, DriverStatus::Busy);

    drivers.set_failing(false);
    state.coordinator.release(booking.id).await.unwrap();

    let d = driver(&state, d.id).await;
    assert_eq!(d.status, DriverStatus::Available);
    assert_eq!(d.total_deliveries, 1);
}
