use crate::{
    db::{query::QueryError, registry::RegistryError, store::StoreError},
    model::index::IndexKind,
};
use derive_more::Display;
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Every failure surfaced by index maintenance and query execution.
/// Zero-result queries and removal misses are not errors.
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// The value cannot be written to the declared index.
    /// Raised before any store mutation for the record.
    #[error("invalid value for index {index}: {reason}")]
    InvalidIndexValue {
        index: String,
        reason: InvalidValueReason,
    },

    /// The store rejected an index write; the record's index entries are stale.
    #[error("index write failed for {index}: {source}")]
    IndexWrite {
        index: String,
        #[source]
        source: StoreError,
    },

    /// A range scan, script call, or intersection failed. No partial result.
    #[error("index read failed for {key}: {source}")]
    IndexRead {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("corrupt index entry in {key}: {message}")]
    Corrupt { key: String, message: String },

    /// A record guard was issued by a different `Db`.
    #[error("record guard for {model}/{id} belongs to another database handle")]
    ForeignGuard { model: String, id: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("record loader failed: {0}")]
    Load(String),
}

impl Error {
    pub(crate) fn invalid_value(index: impl Into<String>, reason: InvalidValueReason) -> Self {
        Self::InvalidIndexValue {
            index: index.into(),
            reason,
        }
    }

    pub(crate) fn index_write(index: impl Into<String>, source: StoreError) -> Self {
        Self::IndexWrite {
            index: index.into(),
            source,
        }
    }

    pub(crate) fn index_read(key: impl Into<String>, source: StoreError) -> Self {
        Self::IndexRead {
            key: key.into(),
            source,
        }
    }

    pub(crate) fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Construct a loader failure from any displayable error.
    pub fn load(err: impl fmt::Display) -> Self {
        Self::Load(err.to_string())
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidIndexValue { .. } => ErrorClass::InvalidInput,
            Self::IndexWrite { .. } | Self::IndexRead { .. } | Self::Load(_) => ErrorClass::Store,
            Self::Corrupt { .. } => ErrorClass::Corruption,
            Self::ForeignGuard { .. } => ErrorClass::Conflict,
            Self::Registry(err) => err.class(),
            Self::Query(err) => err.class(),
        }
    }
}

///
/// InvalidValueReason
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum InvalidValueReason {
    #[error("value contains the reserved NUL separator")]
    ContainsSeparator,

    #[error("{found} value cannot be stored in a {expected} index")]
    KindMismatch {
        expected: IndexKind,
        found: &'static str,
    },

    #[error("NaN cannot be used as an index score")]
    NotANumber,

    #[error("record id must be non-empty and free of NUL bytes")]
    InvalidRecordId,
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorClass {
    #[display("conflict")]
    Conflict,
    #[display("corruption")]
    Corruption,
    #[display("invalid_input")]
    InvalidInput,
    #[display("not_found")]
    NotFound,
    #[display("store")]
    Store,
}

///
/// TESTS
///
