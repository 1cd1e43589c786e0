#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::SdkMeterProvider;
#[cfg(feature = "metrics")]
use prometheus::{Encoder, Registry, TextEncoder};

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<FirecheckMetrics> = Lazy::new(FirecheckMetrics::init);

#[cfg(feature = "metrics")]
pub struct FirecheckMetrics {
    registry: Registry,
    _provider: SdkMeterProvider,
    pub submissions_total: Counter<u64>,
    pub defects_created_total: Counter<u64>,
    pub verification_comments_total: Counter<u64>,
    pub defect_write_failures_total: Counter<u64>,
    pub soft_failures_total: Counter<u64>,
    pub store_call_duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl FirecheckMetrics {
    pub fn init() -> Self {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .expect("failed to build prometheus exporter");
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("firecheck");

        let submissions_total = meter.u64_counter("firecheck_submissions_total")
            .with_description("Inspection submissions by outcome").build();

        let defects_created_total = meter.u64_counter("firecheck_defects_created_total")
            .with_description("Defect issues created").build();

        let verification_comments_total = meter.u64_counter("firecheck_verification_comments_total")
            .with_description("Verification comments added to open defects").build();

        let defect_write_failures_total = meter.u64_counter("firecheck_defect_write_failures_total")
            .with_description("Defect issue or comment writes that failed").build();

        let soft_failures_total = meter.u64_counter("firecheck_soft_failures_total")
            .with_description("Best-effort steps that degraded").build();

        let store_call_duration = meter.f64_histogram("firecheck_store_call_duration_seconds")
            .with_description("Duration of issue store calls").build();

        Self {
            registry,
            _provider: provider,
            submissions_total,
            defects_created_total,
            verification_comments_total,
            defect_write_failures_total,
            soft_failures_total,
            store_call_duration,
        }
    }

    pub fn record_submission(&self, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        self.submissions_total.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn record_defect_created(&self) {
        self.defects_created_total.add(1, &[]);
    }

    pub fn record_verification_comment(&self) {
        self.verification_comments_total.add(1, &[]);
    }

    pub fn record_defect_write_failed(&self) {
        self.defect_write_failures_total.add(1, &[]);
    }

    pub fn record_soft_failure(&self, kind: &'static str) {
        self.soft_failures_total.add(1, &[KeyValue::new("kind", kind)]);
    }

    pub fn record_store_call(&self, op: &'static str, elapsed: std::time::Duration) {
        self.store_call_duration
            .record(elapsed.as_secs_f64(), &[KeyValue::new("op", op)]);
    }

    /// Current metrics in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn submission_span(apparatus: &str, submission_id: &str) -> Span {
        info_span!("firecheck.submission", apparatus = %apparatus, submission_id = %submission_id)
    }

    pub fn reconcile_span(apparatus: &str, defects: usize) -> Span {
        info_span!("firecheck.reconcile", apparatus = %apparatus, defects)
    }

    pub fn build_index_span(apparatus: &str) -> Span {
        info_span!("firecheck.build_index", apparatus = %apparatus)
    }

    pub fn store_call_span(op: &'static str) -> Span {
        info_span!("firecheck.store_call", op)
    }
}
