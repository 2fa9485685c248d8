use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub eligible_drivers: IntGauge,
    pub scans_total: IntCounterVec,
    pub auto_assign_sweeps_total: IntCounter,
    pub auto_assign_results_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total driver assignment attempts by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of driver assignment in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let eligible_drivers = IntGauge::new(
            "eligible_drivers",
            "Available verified drivers seen by the last assignment",
        )
        .expect("valid eligible_drivers metric");

        let scans_total = IntCounterVec::new(
            Opts::new("scans_total", "Accepted scan events by event type"),
            &["event_type"],
        )
        .expect("valid scans_total metric");

        let auto_assign_sweeps_total =
            IntCounter::new("auto_assign_sweeps_total", "Completed auto-assign sweeps")
                .expect("valid auto_assign_sweeps_total metric");

        let auto_assign_results_total = IntCounterVec::new(
            Opts::new(
                "auto_assign_results_total",
                "Per-booking results of auto-assign sweeps",
            ),
            &["outcome"],
        )
        .expect("valid auto_assign_results_total metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(eligible_drivers.clone()))
            .expect("register eligible_drivers");
        registry
            .register(Box::new(scans_total.clone()))
            .expect("register scans_total");
        registry
            .register(Box::new(auto_assign_sweeps_total.clone()))
            .expect("register auto_assign_sweeps_total");
        registry
            .register(Box::new(auto_assign_results_total.clone()))
            .expect("register auto_assign_results_total");

        Self {
            registry,
            assignments_total,
            assignment_latency_seconds,
            eligible_drivers,
            scans_total,
            auto_assign_sweeps_total,
            auto_assign_results_total,
        }
    }

    pub fn record_assignment(&self, outcome: &str, elapsed_secs: f64) {
        self.assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed_secs);
        self.assignments_total.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
