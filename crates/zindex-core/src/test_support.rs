use crate::{
    db::{
        index::maintain_indexes,
        store::{MemoryStore, SortedSetStore},
    },
    model::{entity::ModelSpec, index::IndexModel},
    value::Value,
};
use std::collections::BTreeMap;

/// Model name shared by core tests.
pub(crate) const PERSON: &str = "person";

/// Test record: field name to value.
pub(crate) type Record = BTreeMap<String, Value>;

/// `person` with a numeric `age`, a string `name`, and a boolean `active` index.
#[must_use]
pub(crate) fn person_model() -> ModelSpec {
    ModelSpec::new(PERSON)
        .index(IndexModel::numeric("age"))
        .index(IndexModel::string("name"))
        .index(IndexModel::boolean("active"))
}

/// Build a record from `(field, value)` pairs.
pub(crate) fn record<const N: usize>(fields: [(&str, Value); N]) -> Record {
    fields
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

/// Index a new record; panics on failure.
pub(crate) fn insert(store: &impl SortedSetStore, model: &ModelSpec, id: &str, new: &Record) {
    maintain_indexes(store, model, id, None, Some(new)).expect("insert should index");
}

/// Seed a memory store with `(id, record)` pairs.
pub(crate) fn seeded<'r>(
    model: &ModelSpec,
    rows: impl IntoIterator<Item = (&'r str, Record)>,
) -> MemoryStore {
    let store = MemoryStore::new();
    for (id, row) in rows {
        insert(&store, model, id, &row);
    }

    store
}
