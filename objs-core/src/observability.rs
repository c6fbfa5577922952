/*!
Observability infrastructure for the Objs core.

This module provides:
- Structured logging setup for the `tracing` events emitted by the library
- Prometheus metrics for snapshot operations (behind the `metrics` feature)
*/

#[cfg(feature = "metrics")]
use prometheus::{Counter, Encoder, Histogram, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
#[cfg(feature = "metrics")]
use std::time::Instant;
use tracing::subscriber::set_global_default;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{ObjsError, Result};

/// Global metrics instance
#[cfg(feature = "metrics")]
static METRICS: OnceLock<ObjsMetrics> = OnceLock::new();

/// Metrics collection for Snapshotter operations
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct ObjsMetrics {
    pub snapshots_saved_total: Counter,
    pub snapshots_skipped_total: Counter,
    pub snapshots_evicted_total: Counter,
    pub reverts_total: Counter,
    pub snapshot_seconds: Histogram,

    // Prometheus registry for scraping
    registry: Registry,
}

#[cfg(feature = "metrics")]
impl ObjsMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let snapshots_saved_total = Self::counter(
            &registry,
            "objs_snapshots_saved_total",
            "Total snapshots stored by Snapshotter::save",
        )?;
        let snapshots_skipped_total = Self::counter(
            &registry,
            "objs_snapshots_skipped_total",
            "Total saves skipped because the value was unchanged",
        )?;
        let snapshots_evicted_total = Self::counter(
            &registry,
            "objs_snapshots_evicted_total",
            "Total snapshots dropped from the tail of a full history",
        )?;
        let reverts_total = Self::counter(
            &registry,
            "objs_reverts_total",
            "Total values reverted to a previous snapshot",
        )?;

        let snapshot_seconds = Histogram::with_opts(prometheus::HistogramOpts::new(
            "objs_snapshot_seconds",
            "Duration of taking a snapshot in seconds",
        ))
        .map_err(|e| {
            ObjsError::observability(format!("Failed to create snapshot_seconds metric: {e}"))
        })?;
        registry
            .register(Box::new(snapshot_seconds.clone()))
            .map_err(|e| {
                ObjsError::observability(format!("Failed to register snapshot_seconds: {e}"))
            })?;

        Ok(Self {
            snapshots_saved_total,
            snapshots_skipped_total,
            snapshots_evicted_total,
            reverts_total,
            snapshot_seconds,
            registry,
        })
    }

    fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter> {
        let counter = Counter::new(name, help).map_err(|e| {
            ObjsError::observability(format!("Failed to create {name} metric: {e}"))
        })?;
        registry
            .register(Box::new(counter.clone()))
            .map_err(|e| ObjsError::observability(format!("Failed to register {name}: {e}")))?;
        Ok(counter)
    }

    /// Get or initialize global metrics instance
    pub fn global() -> &'static ObjsMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize Objs metrics"))
    }

    pub fn record_saved(&self) {
        self.snapshots_saved_total.inc();
    }

    pub fn record_skipped(&self) {
        self.snapshots_skipped_total.inc();
    }

    pub fn record_evicted(&self) {
        self.snapshots_evicted_total.inc();
    }

    pub fn record_revert(&self) {
        self.reverts_total.inc();
    }

    pub fn record_snapshot_latency(&self, duration: std::time::Duration) {
        self.snapshot_seconds.observe(duration.as_secs_f64());
    }

    /// Gather metrics in Prometheus format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| ObjsError::observability(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer).map_err(|e| {
            ObjsError::observability(format!("Failed to convert metrics to string: {e}"))
        })
    }
}

/// Gather the global metrics in Prometheus text format
#[cfg(feature = "metrics")]
pub fn gather_metrics() -> Result<String> {
    ObjsMetrics::global().gather_metrics()
}

/// Timer measuring how long taking a snapshot lasts
#[cfg(feature = "metrics")]
pub struct MetricsTimer {
    start: Instant,
}

#[cfg(feature = "metrics")]
impl MetricsTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Complete the timer, recording the elapsed time
    pub fn finish(self) {
        ObjsMetrics::global().record_snapshot_latency(self.start.elapsed());
    }
}

/// Initialize the global observability system
///
/// Installs a `tracing` subscriber filtered by `RUST_LOG` (defaulting to
/// `objs_core=info`), printing either plain text or JSON lines.
///
/// # Arguments
/// * `json` - Whether to emit JSON formatted events
///
/// # Errors
/// * `ObjsError::Observability` - If a global subscriber is already installed
pub fn init_observability(json: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    ObjsMetrics::global();

    let directive: Directive = "objs_core=info"
        .parse()
        .map_err(|e| ObjsError::observability(format!("Invalid log directive: {e}")))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
    };
    result.map_err(|e| {
        ObjsError::observability(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::info!("Objs observability system initialized");
    Ok(())
}

/// Initialize observability with plain text output
pub fn init_default_observability() -> Result<()> {
    init_observability(false)
}
