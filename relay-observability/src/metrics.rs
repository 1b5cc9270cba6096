use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus instrumentation for the adapter/gateway core (§C13). Observes
/// the pipeline; it never gates behavior.
pub struct MetricsCollector {
    registry: Registry,

    /// Requests by module path and response status.
    pub requests_total: IntCounterVec,

    /// End-to-end request latency by module path.
    pub request_duration: HistogramVec,

    /// Step execution latency by step name.
    pub step_duration: HistogramVec,

    /// Signature-validation failures by module path.
    pub signature_validation_failures: IntCounterVec,

    /// Schema-validation failures by module path.
    pub schema_validation_failures: IntCounterVec,

    /// Registry-client calls, labeled `hit` or `miss`.
    pub registry_client_calls: IntCounterVec,

    /// Requests currently in flight.
    pub in_flight_requests: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("relay_requests_total", "Total requests handled").namespace("relay"),
            &["module", "status"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("relay_request_duration_seconds", "Request latency")
                .namespace("relay")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["module"],
        )?;
        let step_duration = HistogramVec::new(
            HistogramOpts::new("relay_step_duration_seconds", "Pipeline step execution time")
                .namespace("relay")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["step"],
        )?;
        let signature_validation_failures = IntCounterVec::new(
            Opts::new("relay_signature_validation_failures_total", "Signature validation failures").namespace("relay"),
            &["module"],
        )?;
        let schema_validation_failures = IntCounterVec::new(
            Opts::new("relay_schema_validation_failures_total", "Schema validation failures").namespace("relay"),
            &["module"],
        )?;
        let registry_client_calls = IntCounterVec::new(
            Opts::new("relay_registry_client_calls_total", "Registry client calls").namespace("relay"),
            &["outcome"],
        )?;
        let in_flight_requests = IntGauge::new("relay_in_flight_requests", "Requests currently in flight")?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(step_duration.clone()))?;
        registry.register(Box::new(signature_validation_failures.clone()))?;
        registry.register(Box::new(schema_validation_failures.clone()))?;
        registry.register(Box::new(registry_client_calls.clone()))?;
        registry.register(Box::new(in_flight_requests.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            step_duration,
            signature_validation_failures,
            schema_validation_failures,
            registry_client_calls,
            in_flight_requests,
        })
    }

    pub fn record_request(&self, module: &str, status: u16, duration_secs: f64) {
        self.requests_total.with_label_values(&[module, &status.to_string()]).inc();
        self.request_duration.with_label_values(&[module]).observe(duration_secs);
    }

    pub fn record_step(&self, step: &str, duration_secs: f64) {
        self.step_duration.with_label_values(&[step]).observe(duration_secs);
    }

    /// Prometheus text exposition for `GET /metrics`.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("failed to construct metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_show_up_in_text_exposition() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.record_request("search", 200, 0.012);
        metrics.record_step("sign", 0.0005);
        let text = metrics.gather_text();
        assert!(text.contains("relay_requests_total"));
        assert!(text.contains("relay_step_duration_seconds"));
    }
}
