//! Metrics sink boundary.
//!
//! Core index/query logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the global metrics state.
use crate::{db::index::script::ScriptKind, obs::metrics};
use std::{cell::RefCell, rc::Rc, time::Instant};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Maintain,
    Query,
}

///
/// PlanKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlanKind {
    /// One score range read straight from an index structure.
    ScoreRange,
    /// Rank range over the all-ids structure.
    AllIds,
    /// Scratch structures built, optionally intersected, then read by rank.
    Materialized,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        kind: ExecKind,
        model: &'a str,
    },
    ExecFinish {
        kind: ExecKind,
        model: &'a str,
        rows: u64,
        micros: u64,
    },
    IndexDelta {
        model: &'a str,
        inserts: u64,
        removes: u64,
    },
    RemoveMiss {
        model: &'a str,
        index: &'a str,
    },
    ScriptCall {
        model: &'a str,
        script: ScriptKind,
    },
    Plan {
        model: &'a str,
        kind: PlanKind,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default process-wide sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { kind, model } => {
                metrics::with_state_mut(|m| {
                    let entry = m.models.entry(model.to_string()).or_default();
                    match kind {
                        ExecKind::Maintain => {
                            m.ops.maintain_calls = m.ops.maintain_calls.saturating_add(1);
                            entry.maintain_calls = entry.maintain_calls.saturating_add(1);
                        }
                        ExecKind::Query => {
                            m.ops.query_calls = m.ops.query_calls.saturating_add(1);
                            entry.query_calls = entry.query_calls.saturating_add(1);
                        }
                    }
                });
            }

            MetricsEvent::ExecFinish {
                kind,
                model,
                rows,
                micros,
            } => {
                metrics::with_state_mut(|m| match kind {
                    ExecKind::Maintain => {
                        m.ops.maintain_micros_total =
                            m.ops.maintain_micros_total.saturating_add(u128::from(micros));
                    }
                    ExecKind::Query => {
                        m.ops.rows_returned = m.ops.rows_returned.saturating_add(rows);
                        metrics::add_micros(
                            &mut m.ops.query_micros_total,
                            &mut m.ops.query_micros_max,
                            micros,
                        );
                        let entry = m.models.entry(model.to_string()).or_default();
                        entry.rows_returned = entry.rows_returned.saturating_add(rows);
                    }
                });
            }

            MetricsEvent::IndexDelta {
                model,
                inserts,
                removes,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.index_inserts = m.ops.index_inserts.saturating_add(inserts);
                    m.ops.index_removes = m.ops.index_removes.saturating_add(removes);
                    let entry = m.models.entry(model.to_string()).or_default();
                    entry.index_inserts = entry.index_inserts.saturating_add(inserts);
                    entry.index_removes = entry.index_removes.saturating_add(removes);
                });
            }

            MetricsEvent::RemoveMiss { model, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.remove_misses = m.ops.remove_misses.saturating_add(1);
                    let entry = m.models.entry(model.to_string()).or_default();
                    entry.remove_misses = entry.remove_misses.saturating_add(1);
                });
            }

            MetricsEvent::ScriptCall { script, .. } => {
                metrics::with_state_mut(|m| match script {
                    ScriptKind::ExtractIds => {
                        m.ops.extract_script_calls = m.ops.extract_script_calls.saturating_add(1);
                    }
                    ScriptKind::CopyScoreRange => {
                        m.ops.copy_script_calls = m.ops.copy_script_calls.saturating_add(1);
                    }
                });
            }

            MetricsEvent::Plan { kind, .. } => {
                metrics::with_state_mut(|m| match kind {
                    PlanKind::ScoreRange => {
                        m.ops.plan_score_range = m.ops.plan_score_range.saturating_add(1);
                    }
                    PlanKind::AllIds => m.ops.plan_all_ids = m.ops.plan_all_ids.saturating_add(1),
                    PlanKind::Materialized => {
                        m.ops.plan_materialized = m.ops.plan_materialized.saturating_add(1);
                    }
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let previous = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = previous;
            });
        }
    }

    let previous = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(previous);

    f()
}

/// Span
/// RAII guard that emits start/finish metrics events for one entrypoint call.
/// Ensures finish accounting happens even on early return.

pub(crate) struct Span<'a> {
    kind: ExecKind,
    model: &'a str,
    start: Instant,
    rows: u64,
}

impl<'a> Span<'a> {
    #[must_use]
    pub(crate) fn new(kind: ExecKind, model: &'a str) -> Self {
        record(MetricsEvent::ExecStart { kind, model });

        Self {
            kind,
            model,
            start: Instant::now(),
            rows: 0,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }
}

impl Drop for Span<'_> {
    fn drop(&mut self) {
        let micros = u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX);

        record(MetricsEvent::ExecFinish {
            kind: self.kind,
            model: self.model,
            rows: self.rows,
            micros,
        });
    }
}

///
/// TESTS
///
