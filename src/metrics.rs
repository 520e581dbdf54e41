use tracing::trace;

// Trace-based metrics helpers. The Prometheus recorder in main handles the
// scrape endpoint; these emit per-route and per-stage events for log-derived
// dashboards.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "snaplist.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "snaplist.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}
