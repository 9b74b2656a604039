use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub location_updates_total: IntCounterVec,
    pub geofence_events_total: IntCounterVec,
    pub geofence_actions_total: IntCounterVec,
    pub eta_calculations_total: IntCounterVec,
    pub dispatch_latency_seconds: Histogram,
    pub tracking_link_resolutions_total: IntCounterVec,
    pub technicians_online: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let location_updates_total = IntCounterVec::new(
            Opts::new("location_updates_total", "Location reports by outcome"),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        let geofence_events_total = IntCounterVec::new(
            Opts::new("geofence_events_total", "Geofence transitions by type"),
            &["event_type"],
        )
        .expect("valid geofence_events_total metric");

        let geofence_actions_total = IntCounterVec::new(
            Opts::new("geofence_actions_total", "Geofence action results"),
            &["result"],
        )
        .expect("valid geofence_actions_total metric");

        let eta_calculations_total = IntCounterVec::new(
            Opts::new("eta_calculations_total", "ETA requests by source"),
            &["source"],
        )
        .expect("valid eta_calculations_total metric");

        let dispatch_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "dispatch_latency_seconds",
            "Latency of dispatch recommendation in seconds",
        ))
        .expect("valid dispatch_latency_seconds metric");

        let tracking_link_resolutions_total = IntCounterVec::new(
            Opts::new(
                "tracking_link_resolutions_total",
                "Public tracking link resolutions by outcome",
            ),
            &["outcome"],
        )
        .expect("valid tracking_link_resolutions_total metric");

        let technicians_online = IntGauge::new(
            "technicians_online",
            "Technicians online with a fresh position",
        )
        .expect("valid technicians_online metric");

        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(geofence_events_total.clone()))
            .expect("register geofence_events_total");
        registry
            .register(Box::new(geofence_actions_total.clone()))
            .expect("register geofence_actions_total");
        registry
            .register(Box::new(eta_calculations_total.clone()))
            .expect("register eta_calculations_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(tracking_link_resolutions_total.clone()))
            .expect("register tracking_link_resolutions_total");
        registry
            .register(Box::new(technicians_online.clone()))
            .expect("register technicians_online");

        Self {
            registry,
            location_updates_total,
            geofence_events_total,
            geofence_actions_total,
            eta_calculations_total,
            dispatch_latency_seconds,
            tracking_link_resolutions_total,
            technicians_online,
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
