use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_total: IntCounterVec,
    pub delivery_legs_total: IntCounterVec,
    pub orders_auto_cancelled_total: IntCounter,
    pub sweep_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Delivery transitions by outcome"),
            &["outcome"],
        )
        .expect("valid deliveries_total metric");

        let delivery_legs_total = IntCounterVec::new(
            Opts::new("delivery_legs_total", "Per-leg transitions by outcome"),
            &["outcome"],
        )
        .expect("valid delivery_legs_total metric");

        let orders_auto_cancelled_total = IntCounter::new(
            "orders_auto_cancelled_total",
            "Stale pending orders cancelled by the sweep",
        )
        .expect("valid orders_auto_cancelled_total metric");

        let sweep_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "sweep_latency_seconds",
                "Latency of one auto-cancel sweep pass in seconds",
            ),
            &["outcome"],
        )
        .expect("valid sweep_latency_seconds metric");

        registry
            .register(Box::new(deliveries_total.clone()))
            .expect("register deliveries_total");
        registry
            .register(Box::new(delivery_legs_total.clone()))
            .expect("register delivery_legs_total");
        registry
            .register(Box::new(orders_auto_cancelled_total.clone()))
            .expect("register orders_auto_cancelled_total");
        registry
            .register(Box::new(sweep_latency_seconds.clone()))
            .expect("register sweep_latency_seconds");

        Self {
            registry,
            deliveries_total,
            delivery_legs_total,
            orders_auto_cancelled_total,
            sweep_latency_seconds,
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
