use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_loaded_total: IntCounterVec,
    pub scans_total: IntCounterVec,
    pub proof_submissions_total: IntCounterVec,
    pub location_samples_total: IntCounter,
    pub location_subscriptions_active: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_loaded_total = IntCounterVec::new(
            Opts::new("deliveries_loaded_total", "Delivery loads by outcome"),
            &["outcome"],
        )
        .expect("valid deliveries_loaded_total metric");

        let scans_total = IntCounterVec::new(
            Opts::new("scans_total", "Barcode scan events by outcome"),
            &["outcome"],
        )
        .expect("valid scans_total metric");

        let proof_submissions_total = IntCounterVec::new(
            Opts::new(
                "proof_submissions_total",
                "Proof-of-delivery submissions by outcome",
            ),
            &["outcome"],
        )
        .expect("valid proof_submissions_total metric");

        let location_samples_total = IntCounter::new(
            "location_samples_total",
            "Location samples applied while tracking",
        )
        .expect("valid location_samples_total metric");

        let location_subscriptions_active = IntGauge::new(
            "location_subscriptions_active",
            "Live location subscriptions",
        )
        .expect("valid location_subscriptions_active metric");

        registry
            .register(Box::new(deliveries_loaded_total.clone()))
            .expect("register deliveries_loaded_total");
        registry
            .register(Box::new(scans_total.clone()))
            .expect("register scans_total");
        registry
            .register(Box::new(proof_submissions_total.clone()))
            .expect("register proof_submissions_total");
        registry
            .register(Box::new(location_samples_total.clone()))
            .expect("register location_samples_total");
        registry
            .register(Box::new(location_subscriptions_active.clone()))
            .expect("register location_subscriptions_active");

        Self {
            registry,
            deliveries_loaded_total,
            scans_total,
            proof_submissions_total,
            location_samples_total,
            location_subscriptions_active,
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
