use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{LazyLock, Mutex, PoisonError},
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for index maintenance and queries.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct EventState {
    pub ops: EventOps,
    pub models: BTreeMap<String, ModelCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            models: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Entrypoints
    pub maintain_calls: u64,
    pub query_calls: u64,

    // Query plans
    pub plan_score_range: u64,
    pub plan_all_ids: u64,
    pub plan_materialized: u64,

    // Rows returned
    pub rows_returned: u64,

    // Index maintenance
    pub index_inserts: u64,
    pub index_removes: u64,
    pub remove_misses: u64,

    // Store-side scripts
    pub extract_script_calls: u64,
    pub copy_script_calls: u64,

    // Timing (microseconds)
    pub maintain_micros_total: u128,
    pub query_micros_total: u128,
    pub query_micros_max: u64,
}

///
/// ModelCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ModelCounters {
    pub maintain_calls: u64,
    pub query_calls: u64,
    pub rows_returned: u64,
    pub index_inserts: u64,
    pub index_removes: u64,
    pub remove_misses: u64,
}

///
/// EventReport
/// Point-in-time snapshot of the counters.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub models: BTreeMap<String, ModelCounters>,
    pub since_ms: u64,
}

static EVENT_STATE: LazyLock<Mutex<EventState>> =
    LazyLock::new(|| Mutex::new(EventState::default()));

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    let state = EVENT_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    f(&state)
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    let mut state = EVENT_STATE.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut state)
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

pub(crate) fn report() -> EventReport {
    with_state(|m| EventReport {
        ops: m.ops.clone(),
        models: m.models.clone(),
        since_ms: m.since_ms,
    })
}

/// Accumulate a duration total and track a max.
pub(crate) fn add_micros(total: &mut u128, max: &mut u64, delta: u64) {
    *total = total.saturating_add(u128::from(delta));
    if delta > *max {
        *max = delta;
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
        })
}
