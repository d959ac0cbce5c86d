use tracing::warn;

/// Record a named counter on the metrics side channel. Nothing here ever fails
/// the caller; the event is only visible to whatever subscriber is installed.
pub fn record(metric: &str) {
    warn!(target: "prsync::metrics", metric, "metric");
}
