use crate::{
    db::{
        direction::Direction,
        index::{
            range::{IndexRange, full_range, resolve},
            script::ScriptKind,
        },
        query::{
            Query, QueryError, ScoreAggregate,
            load::{LoadedRecord, RecordLoader, load_records},
            scratch::ScratchKeys,
        },
        store::{ScoreRange, SortedSetStore, StoreAggregate, WeightedKey, Window},
    },
    error::Error,
    model::{entity::ModelSpec, index::IndexModel},
    obs::sink::{self, ExecKind, MetricsEvent, PlanKind, Span},
};
use std::time::Duration;
use tracing::debug;

///
/// QueryOptions
///
/// Scratch structure naming and lifetime for query execution.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryOptions {
    pub scratch_prefix: String,
    pub scratch_ttl: Duration,
}

impl QueryOptions {
    pub const DEFAULT_SCRATCH_PREFIX: &'static str = "zindex:scratch";
    pub const DEFAULT_SCRATCH_TTL: Duration = Duration::from_secs(60);
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            scratch_prefix: Self::DEFAULT_SCRATCH_PREFIX.to_string(),
            scratch_ttl: Self::DEFAULT_SCRATCH_TTL,
        }
    }
}

///
/// ResolvedQuery
///
/// Every filter lowered to range arguments, plus the order index if any.
/// Produced before the store is touched, so unknown fields and invalid
/// filter values fail without I/O.
///

struct ResolvedQuery<'m> {
    filters: Vec<(&'m IndexModel, IndexRange)>,
    order: Option<&'m IndexModel>,
    direction: Direction,
    window: Window,
    aggregate: ScoreAggregate,
}

impl ResolvedQuery<'_> {
    /// Single scored read that needs no scratch structure, if one applies.
    fn score_fast_path(&self, model: &ModelSpec) -> Option<(String, ScoreRange)> {
        match (self.filters.as_slice(), self.order) {
            ([(index, IndexRange::Score { key, range })], order)
                if order.is_none_or(|order| order.field == index.field) =>
            {
                Some((key.clone(), *range))
            }
            ([], Some(order)) if order.kind.is_scored() => {
                Some((model.index_key(order), ScoreRange::full()))
            }
            _ => None,
        }
    }
}

///
/// QueryExecutor
///
/// Runs one `Query` against one model's index structures.
///
/// Phases: resolve every filter, take a direct read when one applies,
/// otherwise materialize scratch sets, intersect them, and read the result
/// by rank in the requested direction. Scratch sets are deleted afterwards
/// whether or not the read succeeded.
///

pub struct QueryExecutor<'a, S: SortedSetStore + ?Sized> {
    store: &'a S,
    model: &'a ModelSpec,
    options: &'a QueryOptions,
}

impl<'a, S: SortedSetStore + ?Sized> QueryExecutor<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, model: &'a ModelSpec, options: &'a QueryOptions) -> Self {
        Self {
            store,
            model,
            options,
        }
    }

    /// Matching ids, ordered and windowed.
    pub fn ids(&self, query: Query) -> Result<Vec<String>, Error> {
        let mut span = Span::new(ExecKind::Query, &self.model.name);
        let resolved = self.resolve(query)?;
        let ids = self.execute(&resolved)?;
        span.set_rows(ids.len() as u64);

        Ok(ids)
    }

    /// Number of matching ids. The window is ignored.
    pub fn count(&self, query: Query) -> Result<u64, Error> {
        let mut span = Span::new(ExecKind::Query, &self.model.name);
        let mut resolved = self.resolve(query)?;
        resolved.window = Window::all();

        // Every live record matches, so the all-ids cardinality is the answer.
        let count = if resolved.filters.is_empty() && resolved.order.is_none() {
            self.record_plan(PlanKind::AllIds);
            let key = self.model.all_ids_key();
            self.store
                .card(&key)
                .map_err(|err| Error::index_read(key.as_str(), err))?
        } else {
            self.execute(&resolved)?.len() as u64
        };
        span.set_rows(count);

        Ok(count)
    }

    /// Matching records via `loader`, in id order.
    pub fn load<L: RecordLoader + ?Sized>(
        &self,
        query: Query,
        loader: &L,
    ) -> Result<Vec<LoadedRecord<L::Record>>, Error> {
        let ids = self.ids(query)?;

        load_records(loader, ids)
    }

    fn resolve(&self, query: Query) -> Result<ResolvedQuery<'a>, Error> {
        if query.model != self.model.name {
            return Err(QueryError::ModelMismatch {
                expected: query.model,
                found: self.model.name.clone(),
            }
            .into());
        }

        let filters = query
            .filters
            .iter()
            .map(|filter| {
                let index = self.index_for(&filter.field)?;
                let range = resolve(self.model, index, &filter.cmp)?;

                Ok((index, range))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let order = query
            .order_by
            .as_deref()
            .map(|field| self.index_for(field))
            .transpose()?;

        Ok(ResolvedQuery {
            filters,
            order,
            direction: query.direction,
            window: Window::new(query.offset, query.limit),
            aggregate: query.aggregate,
        })
    }

    fn index_for(&self, field: &str) -> Result<&'a IndexModel, Error> {
        self.model.index_for(field).ok_or_else(|| {
            QueryError::UnknownField {
                model: self.model.name.clone(),
                field: field.to_string(),
            }
            .into()
        })
    }

    fn execute(&self, query: &ResolvedQuery<'_>) -> Result<Vec<String>, Error> {
        if query.window.is_empty() {
            return Ok(Vec::new());
        }

        // Phase 1: direct reads.
        if let Some((key, range)) = query.score_fast_path(self.model) {
            self.record_plan(PlanKind::ScoreRange);
            debug!(model = %self.model.name, key = %key, "query: direct score range");

            let members = self
                .store
                .range_by_score(&key, &range, query.direction, query.window)
                .map_err(|err| Error::index_read(key.as_str(), err))?;

            return decode_ids(&key, members);
        }

        if query.filters.is_empty() && query.order.is_none() {
            self.record_plan(PlanKind::AllIds);
            let key = self.model.all_ids_key();

            return self.read_by_rank(&key, query);
        }

        // Phase 2: scratch sets, released even when a step fails.
        self.record_plan(PlanKind::Materialized);
        let mut scratch = ScratchKeys::new(
            &self.options.scratch_prefix,
            &self.model.name,
            self.options.scratch_ttl,
        );
        let result = self.execute_materialized(query, &mut scratch);
        scratch.cleanup(self.store);

        result
    }

    fn execute_materialized(
        &self,
        query: &ResolvedQuery<'_>,
        scratch: &mut ScratchKeys,
    ) -> Result<Vec<String>, Error> {
        // Phase 2a: one scratch set per filter.
        let mut sources = Vec::with_capacity(query.filters.len() + 1);
        let mut order_source = None;
        for (index, range) in &query.filters {
            if query.order.is_some_and(|order| order.field == index.field) {
                order_source = Some(sources.len());
            }
            sources.push(self.materialize(range, scratch)?);
        }

        // Phase 2b: an unfiltered order field joins as its own source.
        if let Some(order) = query.order
            && order_source.is_none()
        {
            order_source = Some(sources.len());
            let source = if order.kind.is_scored() {
                // Scored indexes already carry the order; intersect with them directly.
                self.model.index_key(order)
            } else {
                self.materialize(&full_range(self.model, order), scratch)?
            };
            sources.push(source);
        }

        // Phase 2c: combine.
        let result_key = match sources.as_slice() {
            [only] => only.clone(),
            _ => {
                let destination = scratch.issue();
                let (weighted, aggregate) = weigh(&sources, order_source, query.aggregate);

                debug!(
                    model = %self.model.name,
                    sources = weighted.len(),
                    aggregate = aggregate.as_arg(),
                    "query: intersecting scratch sets"
                );
                self.store
                    .intersect(&destination, &weighted, aggregate)
                    .map_err(|err| Error::index_read(destination.as_str(), err))?;
                self.expire(&destination, scratch.ttl())?;

                destination
            }
        };

        // Phase 2d: ranked read.
        self.read_by_rank(&result_key, query)
    }

    /// Materialize one range into a fresh scratch set and return its key.
    fn materialize(&self, range: &IndexRange, scratch: &mut ScratchKeys) -> Result<String, Error> {
        let destination = scratch.issue();

        let (script, outcome) = match range {
            IndexRange::Lex { key, range } => (
                ScriptKind::ExtractIds,
                self.store.extract_ids(key, &destination, range),
            ),
            IndexRange::Score { key, range } => (
                ScriptKind::CopyScoreRange,
                self.store.copy_score_range(key, &destination, range),
            ),
        };
        sink::record(MetricsEvent::ScriptCall {
            model: &self.model.name,
            script,
        });
        outcome.map_err(|err| Error::index_read(range.key(), err))?;
        self.expire(&destination, scratch.ttl())?;

        Ok(destination)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), Error> {
        self.store
            .expire(key, ttl)
            .map_err(|err| Error::index_read(key, err))
    }

    fn read_by_rank(&self, key: &str, query: &ResolvedQuery<'_>) -> Result<Vec<String>, Error> {
        let members = self
            .store
            .range_by_rank(key, query.direction, query.window)
            .map_err(|err| Error::index_read(key, err))?;

        decode_ids(key, members)
    }

    fn record_plan(&self, kind: PlanKind) {
        sink::record(MetricsEvent::Plan {
            model: &self.model.name,
            kind,
        });
    }
}

fn decode_ids(key: &str, members: Vec<Vec<u8>>) -> Result<Vec<String>, Error> {
    members
        .into_iter()
        .map(|member| {
            String::from_utf8(member).map_err(|_| Error::corrupt(key, "record id is not valid UTF-8"))
        })
        .collect()
}

/// Weights and store aggregate for intersecting `sources`.
///
/// With an order source only its scores survive (weight 1, others 0, SUM).
/// Without one, `First` keeps the first source's scores and the other
/// aggregates weigh every source equally.
fn weigh(
    sources: &[String],
    order_source: Option<usize>,
    aggregate: ScoreAggregate,
) -> (Vec<WeightedKey>, StoreAggregate) {
    let keep_only = |kept: usize| -> Vec<WeightedKey> {
        sources
            .iter()
            .enumerate()
            .map(|(i, key)| WeightedKey::new(key.as_str(), if i == kept { 1.0 } else { 0.0 }))
            .collect()
    };
    let equal = || -> Vec<WeightedKey> {
        sources
            .iter()
            .map(|key| WeightedKey::new(key.as_str(), 1.0))
            .collect()
    };

    match (order_source, aggregate) {
        (Some(kept), _) => (keep_only(kept), StoreAggregate::Sum),
        (None, ScoreAggregate::First) => (keep_only(0), StoreAggregate::Sum),
        (None, ScoreAggregate::Sum) => (equal(), StoreAggregate::Sum),
        (None, ScoreAggregate::Min) => (equal(), StoreAggregate::Min),
        (None, ScoreAggregate::Max) => (equal(), StoreAggregate::Max),
    }
}
