use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::assignment::AssignmentCoordinator;
use crate::error::AppError;
use crate::models::booking::BookingStatus;
use crate::observability::metrics::Metrics;
use crate::store::BookingStore;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SweepFailure {
    pub booking_id: Uuid,
    pub error: String,
}

/// Outcome of one pass over the confirmed, unassigned bookings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub attempted: usize,
    pub assigned: usize,
    pub no_driver: usize,
    /// Bookings that changed under the sweep (assigned elsewhere, cancelled, gone).
    pub skipped: usize,
    pub failed: Vec<SweepFailure>,
}

enum SweepOutcome {
    Assigned,
    NoDriver,
    Skipped,
    Failed(String),
}

impl SweepOutcome {
    fn label(&self) -> &'static str {
        match self {
            SweepOutcome::Assigned => "assigned",
            SweepOutcome::NoDriver => "no_driver",
            SweepOutcome::Skipped => "skipped",
            SweepOutcome::Failed(_) => "failed",
        }
    }
}

/// Periodically assigns drivers to confirmed bookings nobody has picked up.
pub struct AutoAssignScheduler {
    bookings: Arc<dyn BookingStore>,
    coordinator: Arc<AssignmentCoordinator>,
    metrics: Arc<Metrics>,
    period: Duration,
}

impl AutoAssignScheduler {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        coordinator: Arc<AssignmentCoordinator>,
        metrics: Arc<Metrics>,
        period: Duration,
    ) -> Self {
        Self {
            bookings,
            coordinator,
            metrics,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// One pass, oldest booking first. A failing booking never stops the rest.
    pub async fn sweep(&self) -> Result<SweepReport, AppError> {
        let pending = self
            .bookings
            .list_unassigned_by_status(BookingStatus::Confirmed)
            .await?;

        let mut report = SweepReport {
            attempted: pending.len(),
            ..SweepReport::default()
        };

        for booking in pending {
            let outcome = self.assign_isolated(booking.id).await;
            self.metrics
                .auto_assign_results_total
                .with_label_values(&[outcome.label()])
                .inc();

            match outcome {
                SweepOutcome::Assigned => report.assigned += 1,
                SweepOutcome::NoDriver => {
                    warn!(booking_id = %booking.id, "auto-assign found no eligible driver");
                    report.no_driver += 1;
                }
                SweepOutcome::Skipped => report.skipped += 1,
                SweepOutcome::Failed(message) => {
                    error!(booking_id = %booking.id, error = %message, "auto-assign failed");
                    report.failed.push(SweepFailure {
                        booking_id: booking.id,
                        error: message,
                    });
                }
            }
        }

        self.metrics.auto_assign_sweeps_total.inc();
        info!(
            attempted = report.attempted,
            assigned = report.assigned,
            no_driver = report.no_driver,
            skipped = report.skipped,
            failed = report.failed.len(),
            "auto-assign sweep finished"
        );

        Ok(report)
    }

    /// Runs the assignment on its own task so a panic is reported, not propagated.
    async fn assign_isolated(&self, booking_id: Uuid) -> SweepOutcome {
        let coordinator = self.coordinator.clone();
        let handle = tokio::spawn(async move { coordinator.assign(booking_id).await });

        match handle.await {
            Ok(Ok(_)) => SweepOutcome::Assigned,
            Ok(Err(AppError::NoEligibleDriver)) => SweepOutcome::NoDriver,
            Ok(Err(AppError::PreconditionViolation(_) | AppError::NotFound(_))) => {
                SweepOutcome::Skipped
            }
            Ok(Err(err)) => SweepOutcome::Failed(err.to_string()),
            Err(join_err) => SweepOutcome::Failed(format!("assignment task aborted: {join_err}")),
        }
    }

    /// Sweeps every `period` until `cancel` fires. The first sweep runs one period after start.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        info!(period_secs = self.period.as_secs(), "auto-assign scheduler started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(err) = self.sweep().await {
                        error!(error = %err, "auto-assign sweep could not list bookings");
                    }
                }
            }
        }

        info!("auto-assign scheduler stopped");
    }
}
