// src/metrics/collector.rs
use crate::checks::CheckStatus;
use crate::report::write_atomic;
use crate::retry::AttemptOutcome;
use anyhow::Result;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Metrics for a single bring-up run.
pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Text exposition format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    /// Write the metrics for a node-exporter textfile collector. The file is
    /// replaced whole, never appended to.
    pub async fn write_textfile(&self, path: &Path) -> Result<()> {
        let contents = self.gather()?;
        write_atomic(path, &contents).await?;
        Ok(())
    }
}

pub struct MetricsCollector {
    pub probe_attempts_total: IntCounterVec,
    pub probe_latency_seconds: HistogramVec,
    pub unit_ready: IntGaugeVec,
    pub unit_restarts_total: IntCounterVec,
    pub check_results_total: IntCounterVec,
    pub run_duration_seconds: Gauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let probe_attempts_total = IntCounterVec::new(
            Opts::new("bringup_probe_attempts_total", "Readiness probe attempts"),
            &["unit", "probe", "outcome"],
        )?;
        registry.register(Box::new(probe_attempts_total.clone()))?;

        let probe_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "bringup_probe_latency_seconds",
                "Readiness probe attempt latency in seconds",
            ),
            &["unit", "probe"],
        )?;
        registry.register(Box::new(probe_latency_seconds.clone()))?;

        let unit_ready = IntGaugeVec::new(
            Opts::new("bringup_unit_ready", "Unit readiness (1=ready, 0=not ready)"),
            &["unit"],
        )?;
        registry.register(Box::new(unit_ready.clone()))?;

        let unit_restarts_total = IntCounterVec::new(
            Opts::new("bringup_unit_restarts_total", "Restarts issued by the restart-once policy"),
            &["unit"],
        )?;
        registry.register(Box::new(unit_restarts_total.clone()))?;

        let check_results_total = IntCounterVec::new(
            Opts::new("bringup_check_results_total", "Verification check results"),
            &["status"],
        )?;
        registry.register(Box::new(check_results_total.clone()))?;

        let run_duration_seconds =
            Gauge::new("bringup_run_duration_seconds", "Wall time of the bring-up run")?;
        registry.register(Box::new(run_duration_seconds.clone()))?;

        Ok(Self {
            probe_attempts_total,
            probe_latency_seconds,
            unit_ready,
            unit_restarts_total,
            check_results_total,
            run_duration_seconds,
        })
    }

    pub fn record_attempt(&self, unit: &str, probe: &str, outcome: AttemptOutcome, latency: Duration) {
        self.probe_attempts_total
            .with_label_values(&[unit, probe, outcome.as_str()])
            .inc();

        self.probe_latency_seconds
            .with_label_values(&[unit, probe])
            .observe(latency.as_secs_f64());
    }

    pub fn update_unit_ready(&self, unit: &str, ready: bool) {
        let value = if ready { 1 } else { 0 };
        self.unit_ready.with_label_values(&[unit]).set(value);
    }

    pub fn record_restart(&self, unit: &str) {
        self.unit_restarts_total.with_label_values(&[unit]).inc();
    }

    pub fn record_check(&self, status: CheckStatus) {
        self.check_results_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn set_run_duration(&self, duration: Duration) {
        self.run_duration_seconds.set(duration.as_secs_f64());
    }
}

impl fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_recorded_series() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_attempt("sonarqube", "api", AttemptOutcome::Timeout, Duration::from_millis(40));
        metrics.update_unit_ready("sonarqube", false);
        metrics.record_check(CheckStatus::Warn);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains(
            r#"bringup_probe_attempts_total{outcome="timeout",probe="api",unit="sonarqube"} 1"#
        ));
        assert!(text.contains(r#"bringup_unit_ready{unit="sonarqube"} 0"#));
        assert!(text.contains(r#"bringup_check_results_total{status="WARN"} 1"#));
    }

    #[tokio::test]
    async fn test_write_textfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bringup.prom");

        let registry = MetricsRegistry::new().unwrap();
        registry.collector().set_run_duration(Duration::from_secs(3));
        registry.write_textfile(&path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("bringup_run_duration_seconds 3"));
    }
}
