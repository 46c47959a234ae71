//! Prometheus metrics for balancing runs
//!
//! This module provides metrics tracking for:
//! - Balancer: iterations, label moves, eliminations, rollbacks, residual imbalance
//! - Jobs: run outcome and duration
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

use crate::balancer::BalanceReport;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all balancer metrics
struct BalanceMetrics {
    runs: CounterVec,
    iterations: Counter,
    moves: Counter,
    centers_eliminated: Counter,
    rollbacks: Counter,
    isolated_excess: Counter,
    over_capacity_centers: Gauge,
    under_capacity_centers: Gauge,
    run_duration: Histogram,
}

/// Global storage for balancer metrics
static BALANCE_METRICS: OnceLock<BalanceMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Call once at startup. If registration fails the error is returned and
/// every recording function stays a no-op.
///
/// # Example
///
/// ```
/// if let Err(e) = setor::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = BalanceMetrics {
        runs: register_counter_vec!(
            "setor_runs_total",
            "Balancing runs by outcome",
            &["outcome"]
        )?,
        iterations: register_counter!(
            "setor_iterations_total",
            "Balancing iterations executed"
        )?,
        moves: register_counter!(
            "setor_label_moves_total",
            "Point label changes made by the balancer"
        )?,
        centers_eliminated: register_counter!(
            "setor_centers_eliminated_total",
            "Centers removed from the active set"
        )?,
        rollbacks: register_counter!(
            "setor_elimination_rollbacks_total",
            "Center eliminations abandoned and rolled back"
        )?,
        isolated_excess: register_counter!(
            "setor_excess_without_neighbors_total",
            "Overloaded centers with no neighbor inside the radius"
        )?,
        over_capacity_centers: register_gauge!(
            "setor_over_capacity_centers",
            "Centers above max_pdv after the last run"
        )?,
        under_capacity_centers: register_gauge!(
            "setor_under_capacity_centers",
            "Centers below min_pdv after the last run"
        )?,
        run_duration: register_histogram!(
            "setor_run_duration_seconds",
            "Balancing run duration in seconds",
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
        )?,
    };

    BALANCE_METRICS
        .set(metrics)
        .map_err(|_| "Balance metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    BALANCE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a finished balancing run
pub fn record_report(report: &BalanceReport) {
    let Some(m) = BALANCE_METRICS.get() else {
        return;
    };

    let outcome = if report.converged { "converged" } else { "budget_exhausted" };
    m.runs.with_label_values(&[outcome]).inc();
    m.iterations.inc_by(report.iterations as f64);
    m.moves.inc_by(report.total_moves as f64);
    m.centers_eliminated.inc_by(report.eliminated.len() as f64);
    m.rollbacks.inc_by(report.rollbacks() as f64);
    m.isolated_excess.inc_by(report.isolated_excess() as f64);
    m.over_capacity_centers
        .set(report.over_capacity.len() as f64);
    m.under_capacity_centers
        .set(report.under_capacity.len() as f64);
}

/// Record a run aborted by an error
pub fn record_failure(category: &str) {
    if let Some(m) = BALANCE_METRICS.get() {
        m.runs
            .with_label_values(&[&format!("error_{category}")])
            .inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a run timer (returns a timer handle)
pub fn start_run_timer() -> MetricsTimer {
    match BALANCE_METRICS.get() {
        Some(m) => MetricsTimer::new(m.run_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics() {
        assert!(init_metrics().is_ok());
        // Idempotent
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_metrics_initialized() {
        ensure_metrics_initialized();
        assert!(metrics_initialized());
    }

    #[test]
    fn test_encode_metrics() {
        ensure_metrics_initialized();
        record_report(&BalanceReport {
            iterations: 2,
            converged: true,
            ..Default::default()
        });
        let text = encode_metrics().unwrap();
        assert!(text.contains("setor_runs_total"));
    }

    #[test]
    fn test_record_failure_and_timer() {
        ensure_metrics_initialized();
        record_failure("balance");
        let _timer = start_run_timer();
    }
}
