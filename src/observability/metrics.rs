use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub status_transitions_total: IntCounterVec,
    pub location_reports_total: IntCounterVec,
    pub nearby_query_seconds: HistogramVec,
    pub locations_deleted_total: IntCounter,
    pub events_published_total: IntCounterVec,
    pub events_dropped_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Driver status transitions by outcome",
            ),
            &["outcome"],
        )
        .expect("valid status_transitions_total metric");

        let location_reports_total = IntCounterVec::new(
            Opts::new(
                "location_reports_total",
                "Position reports received by outcome",
            ),
            &["outcome"],
        )
        .expect("valid location_reports_total metric");

        let nearby_query_seconds = HistogramVec::new(
            HistogramOpts::new(
                "nearby_query_seconds",
                "Latency of nearby-driver queries in seconds",
            ),
            &["outcome"],
        )
        .expect("valid nearby_query_seconds metric");

        let locations_deleted_total = IntCounter::new(
            "locations_deleted_total",
            "Position reports removed by retention cleanup",
        )
        .expect("valid locations_deleted_total metric");

        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Driver events dispatched by type"),
            &["event_type"],
        )
        .expect("valid events_published_total metric");

        let events_dropped_total = IntCounter::new(
            "events_dropped_total",
            "Driver events that could not be queued",
        )
        .expect("valid events_dropped_total metric");

        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(location_reports_total.clone()))
            .expect("register location_reports_total");
        registry
            .register(Box::new(nearby_query_seconds.clone()))
            .expect("register nearby_query_seconds");
        registry
            .register(Box::new(locations_deleted_total.clone()))
            .expect("register locations_deleted_total");
        registry
            .register(Box::new(events_published_total.clone()))
            .expect("register events_published_total");
        registry
            .register(Box::new(events_dropped_total.clone()))
            .expect("register events_dropped_total");

        Self {
            registry,
            status_transitions_total,
            location_reports_total,
            nearby_query_seconds,
            locations_deleted_total,
            events_published_total,
            events_dropped_total,
        }
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
