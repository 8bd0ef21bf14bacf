//! Observability: runtime counters and the sink boundary that feeds them.
//!
//! Index maintenance and query execution only emit `MetricsEvent`s; they
//! never touch the counter state directly.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport, ModelCounters};
pub use sink::{
    ExecKind, MetricsEvent, MetricsSink, PlanKind, metrics_report, metrics_reset_all,
    with_metrics_sink,
};
