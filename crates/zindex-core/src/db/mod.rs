pub mod direction;
pub mod index;
pub mod lock;
pub mod query;
pub mod registry;
pub mod store;


use crate::{
    Error,
    db::{
        index::IndexDelta,
        lock::{RecordGuard, RecordLocks},
        query::{LoadedRecord, Query, QueryExecutor, QueryOptions, RecordLoader},
        registry::ModelRegistry,
        store::SortedSetStore,
    },
    model::entity::ModelSpec,
    obs::sink::{ExecKind, Span},
    value::FieldValues,
};
use tracing::{debug, warn};

///
/// Db
///
/// Entry point for index maintenance and queries over one store.
///
/// - `S` is the [`SortedSetStore`] backend.
///
/// Owns the model registry, the query options, and the per-record save
/// locks. Store access is blocking; a `Db` may be shared across threads
/// when `S` allows it.
///

#[derive(Debug)]
pub struct Db<S: SortedSetStore> {
    store: S,
    registry: ModelRegistry,
    options: QueryOptions,
    locks: RecordLocks,
}

impl<S: SortedSetStore> Db<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: ModelRegistry::new(),
            options: QueryOptions::default(),
            locks: RecordLocks::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Register a model so it can be maintained and queried.
    pub fn register(&mut self, model: ModelSpec) -> Result<(), Error> {
        self.registry.register(model)?;

        Ok(())
    }

    /// Unregister a model. Its index structures are left in the store;
    /// call [`Db::purge`] first to drop them.
    pub fn unregister(&mut self, name: &str) -> Result<ModelSpec, Error> {
        Ok(self.registry.unregister(name)?)
    }

    /// Delete every index structure of a registered model, the all-ids
    /// structure included. Returns how many record ids were indexed.
    ///
    /// The model stays registered; records saved afterwards are indexed
    /// from scratch.
    pub fn purge(&self, name: &str) -> Result<u64, Error> {
        let model = self.registry.get(name)?;
        let all_ids = model.all_ids_key();

        let removed = self
            .store
            .card(&all_ids)
            .map_err(|err| Error::index_read(all_ids.as_str(), err))?;

        let mut keys: Vec<String> = model
            .indexes
            .iter()
            .map(|index| model.index_key(index))
            .collect();
        keys.push(all_ids);
        self.store
            .delete(&keys)
            .map_err(|err| Error::index_write(model.name.as_str(), err))?;

        debug!(model = %model.name, keys = keys.len(), removed, "indexes purged");

        Ok(removed)
    }

    /// Block until no other in-process save holds `(model, id)`.
    pub fn lock_record(&self, model: &str, id: &str) -> RecordGuard<'_> {
        self.locks.lock(model, id)
    }

    /// Hold `(model, id)` only if it is free.
    pub fn try_lock_record(&self, model: &str, id: &str) -> Option<RecordGuard<'_>> {
        self.locks.try_lock(model, id)
    }

    /// Bring every index of the guarded record in line with `old -> new`.
    ///
    /// `old == None` is a first save, `new == None` is a delete. Invalid
    /// values fail before any store write.
    pub fn maintain_indexes(
        &self,
        guard: &RecordGuard<'_>,
        old: Option<&dyn FieldValues>,
        new: Option<&dyn FieldValues>,
    ) -> Result<IndexDelta, Error> {
        if !guard.is_from(&self.locks) {
            return Err(Error::ForeignGuard {
                model: guard.model().to_string(),
                id: guard.id().to_string(),
            });
        }
        let model = self.registry.get(guard.model())?;

        let mut span = Span::new(ExecKind::Maintain, &model.name);
        let delta = index::maintain_indexes(&self.store, model, guard.id(), old, new)
            .inspect_err(|err| {
                warn!(
                    model = %model.name,
                    id = guard.id(),
                    class = %err.class(),
                    error = %err,
                    "index maintenance failed"
                );
            })?;
        span.set_rows(delta.inserts + delta.removes);

        Ok(delta)
    }

    /// Matching ids, ordered and windowed.
    pub fn query_ids(&self, query: Query) -> Result<Vec<String>, Error> {
        self.executor(&query.model)?.ids(query)
    }

    /// Number of matching ids; the window is ignored.
    pub fn count(&self, query: Query) -> Result<u64, Error> {
        self.executor(&query.model)?.count(query)
    }

    /// Matching records via `loader`, in id order.
    pub fn load<L: RecordLoader + ?Sized>(
        &self,
        query: Query,
        loader: &L,
    ) -> Result<Vec<LoadedRecord<L::Record>>, Error> {
        self.executor(&query.model)?.load(query, loader)
    }

    fn executor(&self, model: &str) -> Result<QueryExecutor<'_, S>, Error> {
        let model = self.registry.get(model)?;

        Ok(QueryExecutor::new(&self.store, model, &self.options))
    }
}
