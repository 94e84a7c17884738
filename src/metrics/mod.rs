//! Prometheus metrics for the driver.
//!
//! Mirrors [`DriverStats`](crate::device::DriverStats) into a Prometheus
//! registry so it can be dumped in text exposition format.
//!
//! # Metrics Exposed
//!
//! ## Activation
//! - `goodix_53xd_active` - Whether the device is activated (1) or not (0)
//! - `goodix_53xd_activations_started_total` - Activation attempts
//! - `goodix_53xd_activations_completed_total` - Activations that reached TLS
//! - `goodix_53xd_activations_failed_total` - Activations that failed
//!
//! ## Scanning
//! - `goodix_53xd_scans_started_total` - Scans started
//! - `goodix_53xd_scans_completed_total` - Scans that produced an image
//! - `goodix_53xd_scans_failed_total` - Scans that failed or were refused
//! - `goodix_53xd_frames_captured_total` - Frames decoded
//! - `goodix_53xd_frames_pending` - Frames waiting for assembly
//!
//! ## Transport
//! - `goodix_53xd_stale_completions_total` - Completions discarded as stale
//!
//! # Example
//!
//! ```
//! use goodix_53xd::device::DriverStats;
//! use goodix_53xd::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.update(&DriverStats {
//!     scans_completed: 3,
//!     ..DriverStats::default()
//! });
//! assert!(registry.encode().unwrap().contains("goodix_53xd_scans_completed_total 3"));
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry};
