//! Metrics collection and registry.

use crate::device::DriverStats;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Metric registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus registry holding the driver metrics.
pub struct MetricsRegistry {
    registry: Registry,

    // Activation metrics
    active: IntGauge,
    activations_started: IntCounter,
    activations_completed: IntCounter,
    activations_failed: IntCounter,

    // Scan metrics
    scans_started: IntCounter,
    scans_completed: IntCounter,
    scans_failed: IntCounter,
    frames_captured: IntCounter,
    frames_pending: IntGauge,

    stale_completions: IntCounter,
}

impl MetricsRegistry {
    /// Creates a registry with every driver metric registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let active = IntGauge::new(
            "goodix_53xd_active",
            "Whether the device is activated (1=activated, 0=inactive)",
        )?;
        let activations_started = IntCounter::new(
            "goodix_53xd_activations_started_total",
            "Total activation attempts",
        )?;
        let activations_completed = IntCounter::new(
            "goodix_53xd_activations_completed_total",
            "Total activations that established the secure channel",
        )?;
        let activations_failed = IntCounter::new(
            "goodix_53xd_activations_failed_total",
            "Total activations that failed",
        )?;

        let scans_started =
            IntCounter::new("goodix_53xd_scans_started_total", "Total scans started")?;
        let scans_completed = IntCounter::new(
            "goodix_53xd_scans_completed_total",
            "Total scans that produced an image",
        )?;
        let scans_failed = IntCounter::new(
            "goodix_53xd_scans_failed_total",
            "Total scans that failed or were refused",
        )?;
        let frames_captured = IntCounter::new(
            "goodix_53xd_frames_captured_total",
            "Total frames decoded from the sensor",
        )?;
        let frames_pending = IntGauge::new(
            "goodix_53xd_frames_pending",
            "Frames stored and waiting for assembly",
        )?;

        let stale_completions = IntCounter::new(
            "goodix_53xd_stale_completions_total",
            "Total completions discarded because their ticket was not outstanding",
        )?;

        registry.register(Box::new(active.clone()))?;
        registry.register(Box::new(activations_started.clone()))?;
        registry.register(Box::new(activations_completed.clone()))?;
        registry.register(Box::new(activations_failed.clone()))?;
        registry.register(Box::new(scans_started.clone()))?;
        registry.register(Box::new(scans_completed.clone()))?;
        registry.register(Box::new(scans_failed.clone()))?;
        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(frames_pending.clone()))?;
        registry.register(Box::new(stale_completions.clone()))?;

        Ok(Self {
            registry,
            active,
            activations_started,
            activations_completed,
            activations_failed,
            scans_started,
            scans_completed,
            scans_failed,
            frames_captured,
            frames_pending,
            stale_completions,
        })
    }

    /// Updates all metrics from the driver's counters.
    pub fn update(&self, stats: &DriverStats) {
        self.active.set(i64::from(stats.activated));
        self.frames_pending.set(stats.frames_pending as i64);

        advance(&self.activations_started, stats.activations_started);
        advance(&self.activations_completed, stats.activations_completed);
        advance(&self.activations_failed, stats.activations_failed);
        advance(&self.scans_started, stats.scans_started);
        advance(&self.scans_completed, stats.scans_completed);
        advance(&self.scans_failed, stats.scans_failed);
        advance(&self.frames_captured, stats.frames_captured);
        advance(&self.stale_completions, stats.stale_completions);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Counters only move forward, so increment by the difference.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let stats = DriverStats {
            activations_started: 2,
            activations_completed: 1,
            activations_failed: 1,
            scans_started: 4,
            scans_completed: 3,
            frames_captured: 6,
            frames_pending: 1,
            activated: true,
            ..DriverStats::default()
        };
        registry.update(&stats);

        let output = registry.encode().unwrap();
        assert!(output.contains("goodix_53xd_active 1"));
        assert!(output.contains("goodix_53xd_activations_failed_total 1"));
        assert!(output.contains("goodix_53xd_scans_completed_total 3"));
        assert!(output.contains("goodix_53xd_frames_captured_total 6"));
        assert!(output.contains("goodix_53xd_frames_pending 1"));
    }

    #[test]
    fn test_counters_never_go_backwards() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&DriverStats {
            scans_failed: 5,
            ..DriverStats::default()
        });
        registry.update(&DriverStats {
            scans_failed: 2,
            ..DriverStats::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("goodix_53xd_scans_failed_total 5"));
        assert!(output.contains("goodix_53xd_active 0"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("goodix_53xd_active"));
        assert!(output.contains("goodix_53xd_stale_completions_total"));
        assert!(output.contains("goodix_53xd_frames_pending"));
    }
}
