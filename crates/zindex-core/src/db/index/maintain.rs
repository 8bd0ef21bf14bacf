//! Module: index::maintain
//! Responsibility: keep index structures consistent with record mutations.
//! Does not own: per-record save serialization (see `db::lock`).
//! Boundary: all validation happens while planning; applying only talks to the store.

use crate::{
    db::{
        index::entry::{IndexEntry, validate_record_id},
        store::SortedSetStore,
    },
    error::Error,
    model::{entity::ModelSpec, index::IndexModel},
    obs::sink::{self, MetricsEvent},
    value::{FieldValues, Value},
};
use tracing::debug;

///
/// IndexDelta
///
/// Store writes performed for one maintenance call.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IndexDelta {
    pub inserts: u64,
    pub removes: u64,
    pub remove_misses: u64,
}

impl IndexDelta {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inserts == 0 && self.removes == 0 && self.remove_misses == 0
    }
}

///
/// IndexOp
///

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum IndexOp {
    Remove {
        key: String,
        label: String,
        entry: IndexEntry,
    },
    Add {
        key: String,
        label: String,
        entry: IndexEntry,
    },
}

///
/// IndexMutationPlan
///
/// Ordered store writes for one record transition. Within an index the
/// removal always precedes the add.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct IndexMutationPlan {
    pub ops: Vec<IndexOp>,
}

impl IndexMutationPlan {
    fn push_transition(
        &mut self,
        model: &ModelSpec,
        index: &IndexModel,
        id: &str,
        previous: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<(), Error> {
        let previous = previous.and_then(Value::as_present);
        let new = new.and_then(Value::as_present);
        if previous == new {
            return Ok(());
        }

        // Build both entries before queuing either so a bad value queues nothing.
        let removal = previous
            .map(|value| IndexEntry::new(index, id, value))
            .transpose()?;
        let addition = new.map(|value| IndexEntry::new(index, id, value)).transpose()?;

        let key = model.index_key(index);
        if let Some(entry) = removal {
            self.ops.push(IndexOp::Remove {
                key: key.clone(),
                label: index.field.clone(),
                entry,
            });
        }
        if let Some(entry) = addition {
            self.ops.push(IndexOp::Add {
                key,
                label: index.field.clone(),
                entry,
            });
        }

        Ok(())
    }
}

/// Plan every index write for one record transition.
///
/// `old == None` is a first save, `new == None` is a delete. All values are
/// validated here; nothing is written.
pub(crate) fn plan_index_mutation(
    model: &ModelSpec,
    id: &str,
    old: Option<&dyn FieldValues>,
    new: Option<&dyn FieldValues>,
) -> Result<IndexMutationPlan, Error> {
    // Phase 1: the id is part of every member, so check it once up front.
    validate_record_id(id).map_err(|reason| Error::invalid_value(model.name.clone(), reason))?;

    let mut plan = IndexMutationPlan::default();

    // Phase 2: per-index transitions in declaration order.
    for index in &model.indexes {
        let previous = old.and_then(|record| record.get_value(&index.field));
        let current = new.and_then(|record| record.get_value(&index.field));

        plan.push_transition(model, index, id, previous.as_ref(), current.as_ref())?;
    }

    // Phase 3: the all-ids structure follows record existence.
    let all_ids = model.all_ids_key();
    match (old.is_some(), new.is_some()) {
        (false, true) => plan.ops.push(IndexOp::Add {
            key: all_ids,
            label: crate::ALL_IDS_NAME.to_string(),
            entry: IndexEntry::all_ids(id),
        }),
        (true, false) => plan.ops.push(IndexOp::Remove {
            key: all_ids,
            label: crate::ALL_IDS_NAME.to_string(),
            entry: IndexEntry::all_ids(id),
        }),
        _ => {}
    }

    Ok(plan)
}

/// Apply a plan in order. A removal miss is not an error; a rejected write is.
pub(crate) fn apply_plan<S: SortedSetStore + ?Sized>(
    store: &S,
    model: &ModelSpec,
    plan: &IndexMutationPlan,
) -> Result<IndexDelta, Error> {
    let mut delta = IndexDelta::default();

    let result = plan.ops.iter().try_for_each(|op| match op {
        IndexOp::Remove { key, label, entry } => {
            let removed = store
                .remove(key, &entry.member)
                .map_err(|err| Error::index_write(label.as_str(), err))?;
            if removed {
                delta.removes += 1;
            } else {
                delta.remove_misses += 1;
                debug!(model = %model.name, index = %label, "index entry already absent");
                sink::record(MetricsEvent::RemoveMiss {
                    model: &model.name,
                    index: label,
                });
            }

            Ok(())
        }
        IndexOp::Add { key, label, entry } => {
            store
                .add(key, entry.score, &entry.member)
                .map_err(|err| Error::index_write(label.as_str(), err))?;
            delta.inserts += 1;

            Ok(())
        }
    });

    // Writes that did land are still reported when a later one fails.
    if delta.inserts > 0 || delta.removes > 0 {
        sink::record(MetricsEvent::IndexDelta {
            model: &model.name,
            inserts: delta.inserts,
            removes: delta.removes,
        });
    }

    result.map(|()| delta)
}

/// Add `id` with `value` to one index.
pub fn add_to_index<S: SortedSetStore + ?Sized>(
    store: &S,
    model: &ModelSpec,
    index: &IndexModel,
    id: &str,
    value: &Value,
) -> Result<(), Error> {
    let entry = IndexEntry::new(index, id, value)?;
    let key = model.index_key(index);

    store
        .add(&key, entry.score, &entry.member)
        .map_err(|err| Error::index_write(index.field.as_str(), err))?;
    sink::record(MetricsEvent::IndexDelta {
        model: &model.name,
        inserts: 1,
        removes: 0,
    });

    Ok(())
}

/// Remove the entry `add_to_index` would have written for `previous`.
///
/// Returns `false` when the entry was already absent; that is not an error.
pub fn remove_from_index<S: SortedSetStore + ?Sized>(
    store: &S,
    model: &ModelSpec,
    index: &IndexModel,
    id: &str,
    previous: &Value,
) -> Result<bool, Error> {
    let entry = IndexEntry::new(index, id, previous)?;
    let key = model.index_key(index);

    let removed = store
        .remove(&key, &entry.member)
        .map_err(|err| Error::index_write(index.field.as_str(), err))?;
    if removed {
        sink::record(MetricsEvent::IndexDelta {
            model: &model.name,
            inserts: 0,
            removes: 1,
        });
    } else {
        debug!(model = %model.name, index = %index.field, id, "index entry already absent");
        sink::record(MetricsEvent::RemoveMiss {
            model: &model.name,
            index: &index.field,
        });
    }

    Ok(removed)
}

/// Move `id` from `previous` to `new` in one index: remove, then add.
///
/// Equal values are a no-op. `new` is validated before the removal is issued.
pub fn update_index<S: SortedSetStore + ?Sized>(
    store: &S,
    model: &ModelSpec,
    index: &IndexModel,
    id: &str,
    previous: Option<&Value>,
    new: Option<&Value>,
) -> Result<IndexDelta, Error> {
    let mut plan = IndexMutationPlan::default();
    plan.push_transition(model, index, id, previous, new)?;

    apply_plan(store, model, &plan)
}

/// Bring every index of `model` in line with a record transition.
///
/// Prefer `Db::maintain_indexes`, which also enforces the per-record save scope.
pub fn maintain_indexes<S: SortedSetStore + ?Sized>(
    store: &S,
    model: &ModelSpec,
    id: &str,
    old: Option<&dyn FieldValues>,
    new: Option<&dyn FieldValues>,
) -> Result<IndexDelta, Error> {
    let plan = plan_index_mutation(model, id, old, new)?;
    let delta = apply_plan(store, model, &plan)?;

    debug!(
        model = %model.name,
        id,
        inserts = delta.inserts,
        removes = delta.removes,
        misses = delta.remove_misses,
        "indexes maintained"
    );

    Ok(delta)
}
