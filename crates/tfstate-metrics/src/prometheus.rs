//! Prometheus text exposition format.
//!
//! Renders the collector plus the active lock gauge for scraping by a
//! Prometheus server or compatible agent.

use std::fmt::Write as _;

use crate::collector::{DEFAULT_BUCKETS, HttpMetrics};

/// Content type of the exposition produced by [`render_prometheus`].
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render request metrics and the number of held locks.
pub fn render_prometheus(metrics: &HttpMetrics, active_locks: usize) -> String {
    let snapshots = metrics.snapshot();
    let mut out = String::new();

    out.push_str("# HELP http_requests_total Total number of HTTP requests\n");
    out.push_str("# TYPE http_requests_total counter\n");
    for s in &snapshots {
        for (status, count) in &s.by_status {
            let _ = writeln!(
                out,
                "http_requests_total{{method=\"{}\",status=\"{}\"}} {}",
                s.method, status, count
            );
        }
    }

    out.push_str("# HELP http_request_duration_seconds HTTP request duration in seconds\n");
    out.push_str("# TYPE http_request_duration_seconds histogram\n");
    for s in &snapshots {
        for (bound, count) in DEFAULT_BUCKETS.iter().zip(&s.cumulative_buckets) {
            let _ = writeln!(
                out,
                "http_request_duration_seconds_bucket{{method=\"{}\",le=\"{}\"}} {}",
                s.method, bound, count
            );
        }
        let _ = writeln!(
            out,
            "http_request_duration_seconds_bucket{{method=\"{}\",le=\"+Inf\"}} {}",
            s.method, s.count
        );
        let _ = writeln!(
            out,
            "http_request_duration_seconds_sum{{method=\"{}\"}} {:.6}",
            s.method, s.sum_seconds
        );
        let _ = writeln!(
            out,
            "http_request_duration_seconds_count{{method=\"{}\"}} {}",
            s.method, s.count
        );
    }

    out.push_str("# HELP tfstate_locks_active Number of currently held state locks\n");
    out.push_str("# TYPE tfstate_locks_active gauge\n");
    let _ = writeln!(out, "tfstate_locks_active {active_locks}");

    out
}
