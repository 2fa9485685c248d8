use std::sync::Arc;

use crate::config::Config;
use crate::engine::assignment::AssignmentCoordinator;
use crate::engine::booking::BookingService;
use crate::engine::journal::EventJournal;
use crate::engine::lifecycle::LifecycleProcessor;
use crate::engine::scheduler::AutoAssignScheduler;
use crate::engine::scoring::MatchingEngine;
use crate::observability::metrics::Metrics;
use crate::pricing::DistanceRatePricing;
use crate::store::Stores;

pub struct AppState {
    pub stores: Stores,
    pub journal: Arc<EventJournal>,
    pub bookings: BookingService,
    pub coordinator: Arc<AssignmentCoordinator>,
    pub lifecycle: LifecycleProcessor,
    pub scheduler: Arc<AutoAssignScheduler>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_stores(config, Stores::in_memory())
    }

    pub fn with_stores(config: &Config, stores: Stores) -> Self {
        let metrics = Arc::new(Metrics::new());
        let journal = Arc::new(EventJournal::new(
            stores.events.clone(),
            config.event_buffer_size,
        ));

        let coordinator = Arc::new(AssignmentCoordinator::new(
            stores.bookings.clone(),
            stores.drivers.clone(),
            stores.hubs.clone(),
            journal.clone(),
            MatchingEngine::new(config.matching.clone()),
            metrics.clone(),
        ));

        let bookings = BookingService::new(
            stores.bookings.clone(),
            journal.clone(),
            Arc::new(DistanceRatePricing::new(config.pricing.clone())),
        );

        let lifecycle = LifecycleProcessor::new(
            stores.bookings.clone(),
            coordinator.clone(),
            journal.clone(),
            metrics.clone(),
        );

        let scheduler = Arc::new(AutoAssignScheduler::new(
            stores.bookings.clone(),
            coordinator.clone(),
            metrics.clone(),
            config.auto_assign_interval,
        ));

        Self {
            stores,
            journal,
            bookings,
            coordinator,
            lifecycle,
            scheduler,
            metrics,
        }
    }
}
