use crate::{
    INDEX_SEPARATOR,
    db::{
        index::{
            IndexDelta, IndexEntry, IndexRange, add_to_index, maintain_indexes, remove_from_index,
            resolve, script::id_from_member, update_index,
        },
        query::Cmp,
        store::{MemoryStore, SortedSetStore, StoreError},
    },
    error::{Error, ErrorClass, InvalidValueReason},
    model::index::IndexModel,
    test_support::{person_model, record},
    value::{FieldValues, Value},
};
use proptest::prelude::*;
use std::time::Duration;

fn ids_matching(store: &MemoryStore, field: &str, cmp: &Cmp) -> Vec<String> {
    let model = person_model();
    let index = model.index_for(field).unwrap();

    let members = match resolve(&model, index, cmp).unwrap() {
        IndexRange::Score { key, range } => store
            .range_by_score(&key, &range, Default::default(), Default::default())
            .unwrap(),
        IndexRange::Lex { key, range } => {
            store.extract_ids(&key, "matched", &range).unwrap();
            let ids = store
                .range_by_rank("matched", Default::default(), Default::default())
                .unwrap();
            store.delete(&["matched".to_string()]).unwrap();
            ids
        }
    };

    members
        .into_iter()
        .map(|id| String::from_utf8(id).unwrap())
        .collect()
}

#[test]
fn numeric_equality_returns_exactly_the_added_id() {
    let store = MemoryStore::new();
    let model = person_model();
    let age = model.index_for("age").unwrap();

    add_to_index(&store, &model, age, "r1", &Value::Int(30)).unwrap();
    add_to_index(&store, &model, age, "r2", &Value::Int(31)).unwrap();

    assert_eq!(ids_matching(&store, "age", &Cmp::Eq(Value::Int(30))), ["r1"]);
}

#[test]
fn string_equality_never_crosses_values() {
    let store = MemoryStore::new();
    let model = person_model();
    let name = model.index_for("name").unwrap();

    add_to_index(&store, &model, name, "x", &Value::from("foo")).unwrap();
    add_to_index(&store, &model, name, "y", &Value::from("foo")).unwrap();
    add_to_index(&store, &model, name, "z", &Value::from("bar")).unwrap();
    add_to_index(&store, &model, name, "w", &Value::from("foobar")).unwrap();

    assert_eq!(
        ids_matching(&store, "name", &Cmp::Eq(Value::from("foo"))),
        ["x", "y"]
    );
    assert_eq!(ids_matching(&store, "name", &Cmp::Eq(Value::from("bar"))), ["z"]);
    assert!(ids_matching(&store, "name", &Cmp::Eq(Value::from("baz"))).is_empty());
}

#[test]
fn update_moves_id_between_values() {
    let store = MemoryStore::new();
    let model = person_model();
    let age = model.index_for("age").unwrap();

    add_to_index(&store, &model, age, "r1", &Value::Int(30)).unwrap();
    let delta = update_index(
        &store,
        &model,
        age,
        "r1",
        Some(&Value::Int(30)),
        Some(&Value::Int(31)),
    )
    .unwrap();

    assert_eq!(
        delta,
        IndexDelta {
            inserts: 1,
            removes: 1,
            remove_misses: 0
        }
    );
    assert!(ids_matching(&store, "age", &Cmp::Eq(Value::Int(30))).is_empty());
    assert_eq!(ids_matching(&store, "age", &Cmp::Eq(Value::Int(31))), ["r1"]);
}

#[test]
fn update_with_equal_values_is_a_no_op() {
    let store = MemoryStore::new();
    let model = person_model();
    let name = model.index_for("name").unwrap();
    let value = Value::from("bob");

    let delta = update_index(&store, &model, name, "r1", Some(&value), Some(&value)).unwrap();

    assert!(delta.is_empty());
    assert!(store.keys().is_empty());
}

#[test]
fn double_removal_is_idempotent() {
    let store = MemoryStore::new();
    let model = person_model();
    let name = model.index_for("name").unwrap();
    let value = Value::from("bob");

    add_to_index(&store, &model, name, "r1", &value).unwrap();

    assert!(remove_from_index(&store, &model, name, "r1", &value).unwrap());
    assert!(!remove_from_index(&store, &model, name, "r1", &value).unwrap());
    assert!(!store.exists("person:name"));
}

#[test]
fn separator_in_value_is_rejected_before_any_mutation() {
    let store = MemoryStore::new();
    let model = person_model();
    let old = record([("age", Value::Int(30)), ("name", Value::from("bob"))]);
    maintain_indexes(&store, &model, "r1", None, Some(&old)).unwrap();
    let before = store.keys().into_iter().map(|key| store.entries(&key)).collect::<Vec<_>>();

    // age changes first in declaration order; the bad name must still block it.
    let new = record([("age", Value::Int(31)), ("name", Value::from("a\0b"))]);
    let err = maintain_indexes(&store, &model, "r1", Some(&old), Some(&new)).unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidIndexValue {
            reason: InvalidValueReason::ContainsSeparator,
            ..
        }
    ));
    assert_eq!(err.class(), ErrorClass::InvalidInput);
    let after = store.keys().into_iter().map(|key| store.entries(&key)).collect::<Vec<_>>();
    assert_eq!(before, after);
}

#[test]
fn kind_mismatch_is_rejected() {
    let store = MemoryStore::new();
    let model = person_model();
    let new = record([("age", Value::from("thirty"))]);

    let err = maintain_indexes(&store, &model, "r1", None, Some(&new)).unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidIndexValue {
            reason: InvalidValueReason::KindMismatch { .. },
            ..
        }
    ));
    assert!(store.keys().is_empty());
}

#[test]
fn first_save_indexes_present_fields_and_all_ids() {
    let store = MemoryStore::new();
    let model = person_model();
    let new = record([
        ("age", Value::Int(0)),
        ("name", Value::from("bob")),
        ("active", Value::Bool(false)),
        ("nickname", Value::from("ignored")),
    ]);

    let delta = maintain_indexes(&store, &model, "r1", None, Some(&new)).unwrap();

    assert_eq!(delta.inserts, 4);
    assert_eq!(store.entries("person:age"), [(b"r1".to_vec(), 0.0)]);
    assert_eq!(store.entries("person:name"), [(b"bob\0r1".to_vec(), 0.0)]);
    assert_eq!(store.entries("person:active"), [(b"r1".to_vec(), 0.0)]);
    assert_eq!(store.entries("person:all"), [(b"r1".to_vec(), 0.0)]);
}

#[test]
fn absent_fields_are_not_indexed() {
    let store = MemoryStore::new();
    let model = person_model();
    let new = record([("age", Value::Int(30)), ("name", Value::None)]);

    maintain_indexes(&store, &model, "r1", None, Some(&new)).unwrap();

    assert!(store.exists("person:age"));
    assert!(!store.exists("person:name"));
    assert!(!store.exists("person:active"));
}

#[test]
fn clearing_a_field_removes_its_entry() {
    let store = MemoryStore::new();
    let model = person_model();
    let old = record([("age", Value::Int(30)), ("name", Value::from("bob"))]);
    let new = record([("age", Value::Int(30))]);
    maintain_indexes(&store, &model, "r1", None, Some(&old)).unwrap();

    let delta = maintain_indexes(&store, &model, "r1", Some(&old), Some(&new)).unwrap();

    assert_eq!(delta.removes, 1);
    assert_eq!(delta.inserts, 0);
    assert!(!store.exists("person:name"));
    assert!(store.exists("person:all"));
}

#[test]
fn delete_removes_every_entry() {
    let store = MemoryStore::new();
    let model = person_model();
    let old = record([
        ("age", Value::Int(30)),
        ("name", Value::from("bob")),
        ("active", Value::Bool(true)),
    ]);
    maintain_indexes(&store, &model, "r1", None, Some(&old)).unwrap();

    let delta = maintain_indexes(&store, &model, "r1", Some(&old), None).unwrap();

    assert_eq!(delta.removes, 4);
    assert!(store.keys().is_empty());
}

#[test]
fn stale_old_record_counts_remove_misses() {
    let store = MemoryStore::new();
    let model = person_model();
    let old = record([("age", Value::Int(30))]);

    let delta = maintain_indexes(&store, &model, "r1", Some(&old), None).unwrap();

    assert_eq!(delta.removes, 0);
    assert_eq!(delta.remove_misses, 2);
}

#[test]
fn invalid_record_id_is_rejected() {
    let store = MemoryStore::new();
    let model = person_model();
    let new = record([("age", Value::Int(30))]);

    for id in ["", "r\01"] {
        let err = maintain_indexes(&store, &model, id, None, Some(&new)).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidIndexValue {
                reason: InvalidValueReason::InvalidRecordId,
                ..
            }
        ));
    }
    assert!(store.keys().is_empty());
}

///
/// Store failure injection
///

#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    ops: std::sync::Mutex<Vec<String>>,
    fail_adds: bool,
}

impl SortedSetStore for RecordingStore {
    fn add(&self, key: &str, score: f64, member: &[u8]) -> Result<(), StoreError> {
        self.ops.lock().unwrap().push(format!("add {key}"));
        if self.fail_adds {
            return Err(StoreError::Command("read only replica".to_string()));
        }
        self.inner.add(key, score, member)
    }

    fn remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        self.ops.lock().unwrap().push(format!("remove {key}"));
        self.inner.remove(key, member)
    }

    fn range_by_score(
        &self,
        key: &str,
        range: &crate::db::store::ScoreRange,
        direction: crate::db::direction::Direction,
        window: crate::db::store::Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        self.inner.range_by_score(key, range, direction, window)
    }

    fn card(&self, key: &str) -> Result<u64, StoreError> {
        self.inner.card(key)
    }

    fn range_by_rank(
        &self,
        key: &str,
        direction: crate::db::direction::Direction,
        window: crate::db::store::Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        self.inner.range_by_rank(key, direction, window)
    }

    fn extract_ids(
        &self,
        source: &str,
        destination: &str,
        range: &crate::db::store::LexRange,
    ) -> Result<(), StoreError> {
        self.inner.extract_ids(source, destination, range)
    }

    fn copy_score_range(
        &self,
        source: &str,
        destination: &str,
        range: &crate::db::store::ScoreRange,
    ) -> Result<(), StoreError> {
        self.inner.copy_score_range(source, destination, range)
    }

    fn intersect(
        &self,
        destination: &str,
        sources: &[crate::db::store::WeightedKey],
        aggregate: crate::db::store::StoreAggregate,
    ) -> Result<u64, StoreError> {
        self.inner.intersect(destination, sources, aggregate)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.expire(key, ttl)
    }

    fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        self.inner.delete(keys)
    }
}

#[test]
fn removal_precedes_addition_within_an_index() {
    let store = RecordingStore::default();
    let model = person_model();
    let old = record([("name", Value::from("bob"))]);
    let new = record([("name", Value::from("rob"))]);

    maintain_indexes(&store, &model, "r1", Some(&old), Some(&new)).unwrap();

    assert_eq!(
        *store.ops.lock().unwrap(),
        ["remove person:name", "add person:name"]
    );
}

#[test]
fn store_rejection_surfaces_as_index_write() {
    let store = RecordingStore {
        fail_adds: true,
        ..RecordingStore::default()
    };
    let model = person_model();
    let new = record([("age", Value::Int(30))]);

    let err = maintain_indexes(&store, &model, "r1", None, Some(&new)).unwrap_err();

    assert!(matches!(err, Error::IndexWrite { ref index, .. } if index == "age"));
    assert_eq!(err.class(), ErrorClass::Store);
}

#[test]
fn slice_records_are_field_values() {
    let fields: [(&str, Value); 1] = [("age", Value::Uint(7))];

    assert_eq!(fields.get_value("age"), Some(Value::Uint(7)));
    assert_eq!(fields.get_value("name"), None);
}

///
/// Properties
///

fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(1u8..=0x7f, 0..8)
        .prop_map(|bytes| String::from_utf8(bytes).unwrap_or_default())
}

fn arb_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9:_-]{1,12}"
}

proptest! {
    #[test]
    fn member_order_follows_value_order(a in arb_text(), b in arb_text(), id_a in arb_id(), id_b in arb_id()) {
        prop_assume!(a != b);
        let index = IndexModel::string("name");
        let ma = IndexEntry::new(&index, &id_a, &Value::from(a.as_str())).unwrap().member;
        let mb = IndexEntry::new(&index, &id_b, &Value::from(b.as_str())).unwrap().member;

        prop_assert_eq!(a.as_bytes() < b.as_bytes(), ma < mb);
    }

    #[test]
    fn id_is_recovered_from_any_member(value in arb_text(), id in arb_id()) {
        let entry = IndexEntry::new(&IndexModel::string("name"), &id, &Value::from(value.as_str())).unwrap();

        prop_assert_eq!(id_from_member(&entry.member), Some(id.as_bytes()));
        prop_assert_eq!(
            entry.member.iter().filter(|byte| **byte == INDEX_SEPARATOR).count(),
            1
        );
    }

    #[test]
    fn integer_scores_preserve_order(a in -(1i64 << 53)..(1i64 << 53), b in -(1i64 << 53)..(1i64 << 53)) {
        let index = IndexModel::numeric("age");
        let sa = IndexEntry::new(&index, "r", &Value::Int(a)).unwrap().score;
        let sb = IndexEntry::new(&index, "r", &Value::Int(b)).unwrap().score;

        prop_assert_eq!(a.cmp(&b), sa.total_cmp(&sb));
    }
}
