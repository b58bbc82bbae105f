use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
///
/// Only one global recorder can exist per process; later calls get a
/// detached handle instead of failing.
pub fn init_metrics() -> PrometheusHandle {
    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!(error = %e, "Prometheus recorder already installed");
            return PrometheusBuilder::new().build_recorder().handle();
        }
    };

    // Pre-register counters so they appear even before the first increment.
    counter!("holdings_scans_total").absolute(0);
    counter!("chain_scan_failures_total").absolute(0);
    counter!("indexer_failures_total").absolute(0);
    counter!("catalog_refreshes_total").absolute(0);
    counter!("recommendations_generated_total").absolute(0);
    counter!("actions_completed_total").absolute(0);
    counter!("actions_failed_total").absolute(0);

    gauge!("catalog_active_opportunities").set(0.0);

    // Histograms are lazily created on first record; force creation.
    histogram!("holdings_scan_seconds").record(0.0);
    histogram!("plan_execution_seconds").record(0.0);

    handle
}
