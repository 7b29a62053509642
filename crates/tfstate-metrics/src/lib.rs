//! tfstate-metrics: observability for the state server.
//!
//! # Architecture
//!
//! ```text
//! HttpMetrics
//!   ├── record() ← called once per HTTP request by the middleware
//!   └── snapshot() → per-method counters and latency histogram
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for the /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::{HttpMetrics, KNOWN_METHODS, MethodSnapshot, OTHER_METHOD, method_label};
pub use prometheus::{CONTENT_TYPE, render_prometheus};
