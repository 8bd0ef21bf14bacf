//! Module: db::query
//! Responsibility: the query vocabulary (filters, ordering, window) and its
//! execution against index structures.
//!
//! A `Query` is built by value and consumed by its terminal (`ids`, `count`,
//! `load`), so no filter can be applied once the query has been resolved.

mod executor;
mod load;
mod scratch;


use crate::{db::direction::Direction, error::ErrorClass, value::Value};
use thiserror::Error as ThisError;

pub use executor::{QueryExecutor, QueryOptions};
pub use load::{LoadedRecord, RecordLoader};
pub use scratch::ScratchKeys;

///
/// QueryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("model '{model}' has no index on field '{field}'")]
    UnknownField { model: String, field: String },

    #[error("query for '{expected}' executed against model '{found}'")]
    ModelMismatch { expected: String, found: String },
}

impl QueryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownField { .. } => ErrorClass::NotFound,
            Self::ModelMismatch { .. } => ErrorClass::InvalidInput,
        }
    }
}

///
/// Cmp
///
/// Comparison applied to one indexed field. `Between` is inclusive on both ends.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Cmp {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Between(Value, Value),
}

///
/// Filter
///

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub cmp: Cmp,
}

impl Filter {
    #[must_use]
    pub fn new(field: impl Into<String>, cmp: Cmp) -> Self {
        Self {
            field: field.into(),
            cmp,
        }
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Cmp::Eq(value.into()))
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Cmp::Gt(value.into()))
    }

    #[must_use]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Cmp::Gte(value.into()))
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Cmp::Lt(value.into()))
    }

    #[must_use]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Cmp::Lte(value.into()))
    }

    #[must_use]
    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::new(field, Cmp::Between(low.into(), high.into()))
    }
}

///
/// ScoreAggregate
///
/// How scores combine when several filters are intersected and no order
/// field is given. `First` keeps the first filter's ordering.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ScoreAggregate {
    #[default]
    First,
    Sum,
    Min,
    Max,
}

///
/// Query
///

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub model: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub direction: Direction,
    pub offset: usize,
    pub limit: Option<usize>,
    pub aggregate: ScoreAggregate,
}

impl Query {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            filters: Vec::new(),
            order_by: None,
            direction: Direction::Asc,
            offset: 0,
            limit: None,
            aggregate: ScoreAggregate::First,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Order by an indexed field. The direction is left as set, which is
    /// ascending unless `direction` or `order_by_desc` changed it.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Order descending by an indexed field.
    #[must_use]
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self.direction = Direction::Desc;
        self
    }

    /// Set the retrieval direction. Order fields set before or after keep it.
    #[must_use]
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn aggregate(mut self, aggregate: ScoreAggregate) -> Self {
        self.aggregate = aggregate;
        self
    }
}
