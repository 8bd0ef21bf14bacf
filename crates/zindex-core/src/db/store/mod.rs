//! Module: db::store
//! Responsibility: the sorted-set store port consumed by index maintenance
//! and query execution, plus the range/window argument types it speaks.
//! Does not own: connection pooling or retry policy.

mod memory;


use crate::db::direction::Direction;
use std::time::Duration;
use thiserror::Error as ThisError;

pub use memory::MemoryStore;

///
/// StoreError
///
/// Failure reported by a store backend. Backends never retry.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("command failed: {0}")]
    Command(String),
}

///
/// ScoreBound
///
/// One end of a score range. Exclusive bounds drop the boundary value itself.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScoreBound {
    NegInf,
    PosInf,
    Included(f64),
    Excluded(f64),
}

impl ScoreBound {
    /// Render this bound in the store's range argument syntax.
    #[must_use]
    pub fn to_arg(&self) -> String {
        match self {
            Self::NegInf => "-inf".to_string(),
            Self::PosInf => "+inf".to_string(),
            Self::Included(score) => format!("{score}"),
            Self::Excluded(score) => format!("({score}"),
        }
    }

    /// Whether `score` lies on the permitted side of this bound used as a minimum.
    #[must_use]
    pub fn admits_as_min(&self, score: f64) -> bool {
        match self {
            Self::NegInf => true,
            Self::PosInf => false,
            Self::Included(min) => score >= *min,
            Self::Excluded(min) => score > *min,
        }
    }

    /// Whether `score` lies on the permitted side of this bound used as a maximum.
    #[must_use]
    pub fn admits_as_max(&self, score: f64) -> bool {
        match self {
            Self::NegInf => false,
            Self::PosInf => true,
            Self::Included(max) => score <= *max,
            Self::Excluded(max) => score < *max,
        }
    }
}

///
/// ScoreRange
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreRange {
    pub min: ScoreBound,
    pub max: ScoreBound,
}

impl ScoreRange {
    #[must_use]
    pub const fn new(min: ScoreBound, max: ScoreBound) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub const fn full() -> Self {
        Self::new(ScoreBound::NegInf, ScoreBound::PosInf)
    }

    #[must_use]
    pub fn contains(&self, score: f64) -> bool {
        self.min.admits_as_min(score) && self.max.admits_as_max(score)
    }
}

///
/// LexBound
///
/// One end of a lexicographic member range.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LexBound {
    Min,
    Max,
    Included(Vec<u8>),
    Excluded(Vec<u8>),
}

impl LexBound {
    /// Render this bound in the store's lex range syntax (`-`, `+`, `[x`, `(x`).
    #[must_use]
    pub fn to_arg(&self) -> Vec<u8> {
        match self {
            Self::Min => b"-".to_vec(),
            Self::Max => b"+".to_vec(),
            Self::Included(bytes) => prefixed(b'[', bytes),
            Self::Excluded(bytes) => prefixed(b'(', bytes),
        }
    }

    #[must_use]
    pub fn admits_as_min(&self, member: &[u8]) -> bool {
        match self {
            Self::Min => true,
            Self::Max => false,
            Self::Included(min) => member >= min.as_slice(),
            Self::Excluded(min) => member > min.as_slice(),
        }
    }

    #[must_use]
    pub fn admits_as_max(&self, member: &[u8]) -> bool {
        match self {
            Self::Min => false,
            Self::Max => true,
            Self::Included(max) => member <= max.as_slice(),
            Self::Excluded(max) => member < max.as_slice(),
        }
    }
}

fn prefixed(marker: u8, bytes: &[u8]) -> Vec<u8> {
    let mut arg = Vec::with_capacity(bytes.len() + 1);
    arg.push(marker);
    arg.extend_from_slice(bytes);
    arg
}

///
/// LexRange
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LexRange {
    pub min: LexBound,
    pub max: LexBound,
}

impl LexRange {
    #[must_use]
    pub const fn new(min: LexBound, max: LexBound) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub const fn full() -> Self {
        Self::new(LexBound::Min, LexBound::Max)
    }

    #[must_use]
    pub fn contains(&self, member: &[u8]) -> bool {
        self.min.admits_as_min(member) && self.max.admits_as_max(member)
    }
}

///
/// Window
///
/// Offset/limit slice over an ordered sequence. `limit: None` reads to the end.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Window {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Window {
    #[must_use]
    pub const fn new(offset: usize, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }

    #[must_use]
    pub const fn all() -> Self {
        Self::new(0, None)
    }

    /// A window that can never yield a row.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.limit, Some(0))
    }

    /// Inclusive rank bounds `(start, stop)`; `stop == -1` means "to the end".
    #[must_use]
    pub fn rank_bounds(&self) -> (i64, i64) {
        let start = i64::try_from(self.offset).unwrap_or(i64::MAX);
        let stop = match self.limit {
            Some(limit) => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                start.saturating_add(limit).saturating_sub(1)
            }
            None => -1,
        };

        (start, stop)
    }

    /// Apply this window to an already ordered iterator.
    pub fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        let items = items.skip(self.offset);
        match self.limit {
            Some(limit) => items.take(limit).collect(),
            None => items.collect(),
        }
    }
}

///
/// StoreAggregate
///
/// How member scores combine across an intersection.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StoreAggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl StoreAggregate {
    #[must_use]
    pub const fn as_arg(self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

///
/// WeightedKey
///

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedKey {
    pub key: String,
    pub weight: f64,
}

impl WeightedKey {
    #[must_use]
    pub fn new(key: impl Into<String>, weight: f64) -> Self {
        Self {
            key: key.into(),
            weight,
        }
    }
}

///
/// SortedSetStore
///
/// Blocking port onto a store of ordered (score, member) sets.
/// Members with equal scores are ordered by their bytes.
/// Every call is a single round trip or a single atomic script call.
///

pub trait SortedSetStore {
    /// Insert or rescore `member`.
    fn add(&self, key: &str, score: f64, member: &[u8]) -> Result<(), StoreError>;

    /// Remove `member`; returns `false` when it was not present.
    fn remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError>;

    /// Members whose score lies in `range`, in `direction`, sliced by `window`.
    fn range_by_score(
        &self,
        key: &str,
        range: &ScoreRange,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Number of members in `key`; an absent key has none.
    fn card(&self, key: &str) -> Result<u64, StoreError>;

    /// Members by rank in `direction`, sliced by `window`.
    fn range_by_rank(
        &self,
        key: &str,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Atomically read `range` from the string index `source`, strip each
    /// member down to the id after its last separator, and add the ids to
    /// `destination` with 1-based rank scores. An empty range leaves
    /// `destination` untouched.
    fn extract_ids(
        &self,
        source: &str,
        destination: &str,
        range: &LexRange,
    ) -> Result<(), StoreError>;

    /// Atomically copy the members of `source` whose score lies in `range`
    /// into `destination`, keeping their scores.
    fn copy_score_range(
        &self,
        source: &str,
        destination: &str,
        range: &ScoreRange,
    ) -> Result<(), StoreError>;

    /// Replace `destination` with the intersection of `sources`, scoring each
    /// member by `aggregate` over the weighted source scores.
    /// Returns the cardinality of `destination`.
    fn intersect(
        &self,
        destination: &str,
        sources: &[WeightedKey],
        aggregate: StoreAggregate,
    ) -> Result<u64, StoreError>;

    /// Set a time-to-live on `key`.
    fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete `keys`; absent keys are ignored.
    fn delete(&self, keys: &[String]) -> Result<(), StoreError>;
}

impl<S: SortedSetStore + ?Sized> SortedSetStore for &S {
    fn add(&self, key: &str, score: f64, member: &[u8]) -> Result<(), StoreError> {
        (**self).add(key, score, member)
    }

    fn remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        (**self).remove(key, member)
    }

    fn range_by_score(
        &self,
        key: &str,
        range: &ScoreRange,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).range_by_score(key, range, direction, window)
    }

    fn card(&self, key: &str) -> Result<u64, StoreError> {
        (**self).card(key)
    }

    fn range_by_rank(
        &self,
        key: &str,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        (**self).range_by_rank(key, direction, window)
    }

    fn extract_ids(
        &self,
        source: &str,
        destination: &str,
        range: &LexRange,
    ) -> Result<(), StoreError> {
        (**self).extract_ids(source, destination, range)
    }

    fn copy_score_range(
        &self,
        source: &str,
        destination: &str,
        range: &ScoreRange,
    ) -> Result<(), StoreError> {
        (**self).copy_score_range(source, destination, range)
    }

    fn intersect(
        &self,
        destination: &str,
        sources: &[WeightedKey],
        aggregate: StoreAggregate,
    ) -> Result<u64, StoreError> {
        (**self).intersect(destination, sources, aggregate)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).expire(key, ttl)
    }

    fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        (**self).delete(keys)
    }
}
