//! Store metrics and the Prometheus recorder.
//!
//! The store records through the `metrics` facade; nothing is exported until a
//! binary installs a recorder with [`MetricsRecorder::install`].
//!
//! # Exported Metrics
//!
//! - `store.commands.total` - actions accepted by a store
//! - `store.reducer.duration_seconds` - time spent inside the reducer (write lock held)
//! - `store.effects.executed{type}` - effects started, by variant
//! - `store.shutdown.*` - shutdown lifecycle counters

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Process-wide Prometheus recorder.
///
/// Holds the handle used to render the current metrics in text format.
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Describe the store metrics and install the Prometheus recorder globally.
    ///
    /// If another recorder is already installed (tests running in one process)
    /// the call still succeeds, but [`MetricsRecorder::render`] returns `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn install() -> Result<Self, MetricsError> {
        register_store_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_01, 0.000_1, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus metrics recorder installed");
                Ok(Self {
                    handle: Some(handle),
                })
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(Self { handle: None })
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for the metrics the store emits.
pub fn register_store_metrics() {
    describe_counter!("store.commands.total", "Total number of actions sent to a store");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent reducing one action while holding the state write lock"
    );
    describe_counter!("store.effects.executed", "Effects started, labelled by effect type");
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );
    describe_counter!("store.shutdown.initiated", "Graceful shutdowns started");
    describe_counter!(
        "store.shutdown.timeout",
        "Graceful shutdowns that timed out with effects still running"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_install_is_repeatable() {
        let first = MetricsRecorder::install().unwrap();
        let second = MetricsRecorder::install().unwrap();
        // Only one recorder can own the global slot
        assert!(first.render().is_none() || second.render().is_none());
    }
}
