//! Core runtime for zindex: model descriptors, values, the index maintainer,
//! range lowering, the query executor, and the sorted-set store port.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Byte separating the encoded value from the record id in string index members.
///
/// NUL sorts below every other byte, so `value + NUL + id` members keep the
/// byte-lexicographic order of their values.
pub const INDEX_SEPARATOR: u8 = 0x00;

/// Redis-visible name of the per-model structure holding every live record id.
pub const ALL_IDS_NAME: &str = "all";

/// Character joining the model name and the index name in store keys.
/// Neither segment may contain it, so every key has exactly one owner.
pub const KEY_SEPARATOR: char = ':';

pub use error::Error;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, stores, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            direction::Direction,
            query::{Cmp, Filter, Query, ScoreAggregate},
        },
        model::{entity::ModelSpec, index::IndexKind, index::IndexModel},
        value::{FieldValues, Value},
    };
}
