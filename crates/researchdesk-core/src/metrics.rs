use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::session::SessionStatus;

struct PipelineMetrics {
    sessions: Counter<u64>,
    duration_ms: Histogram<f64>,
    findings: Counter<u64>,
}

static METRICS: OnceCell<PipelineMetrics> = OnceCell::new();

fn handles() -> &'static PipelineMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("researchdesk.pipeline");
        PipelineMetrics {
            sessions: meter
                .u64_counter("research_sessions_total")
                .with_description("Research sessions by terminal status")
                .init(),
            duration_ms: meter
                .f64_histogram("research_session_duration_ms")
                .with_description("Wall-clock time of the agent call in milliseconds")
                .init(),
            findings: meter
                .u64_counter("research_findings_total")
                .with_description("Findings returned by completed sessions")
                .init(),
        }
    })
}

/// Log a hint when an OTLP metrics endpoint is configured; the meter provider
/// itself is installed by the deployment.
pub fn init_metrics_from_env(service_name: &str) {
    if let Ok(endpoint) = std::env::var("RESEARCHDESK_OTEL_METRICS_ENDPOINT") {
        info!(
            target = "telemetry",
            %endpoint,
            "metrics endpoint configured for {service_name}; install an OTLP meter provider to export pipeline metrics"
        );
    }
}

/// Record one finished session (no-op if no provider installed).
pub fn record_session(status: SessionStatus, duration_ms: u64, findings: usize) {
    let metrics = handles();
    let attrs = [KeyValue::new("status", status.as_str())];

    metrics.sessions.add(1, &attrs);
    metrics.duration_ms.record(duration_ms as f64, &attrs);
    if status == SessionStatus::Completed {
        metrics.findings.add(findings as u64, &[]);
    }
}
