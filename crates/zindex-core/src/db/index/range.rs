//! Module: index::range
//! Responsibility: typed filter -> concrete range arguments for one index structure.
//! Does not own: range execution or id extraction.
//! Boundary: the query executor calls this once per filter before touching the store.

use crate::{
    INDEX_SEPARATOR,
    db::{
        index::codec::{encode_lex, encode_score},
        query::Cmp,
        store::{LexBound, LexRange, ScoreBound, ScoreRange},
    },
    error::Error,
    model::{entity::ModelSpec, index::IndexModel},
    value::Value,
};

/// Upper sentinel appended after the separator. Ids are UTF-8 and never carry 0xFF.
const MEMBER_CEILING: u8 = 0xFF;

///
/// IndexRange
///
/// Range arguments for one index structure.
///

#[derive(Clone, Debug, PartialEq)]
pub enum IndexRange {
    Score { key: String, range: ScoreRange },
    Lex { key: String, range: LexRange },
}

impl IndexRange {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Score { key, .. } | Self::Lex { key, .. } => key,
        }
    }
}

/// Resolve `cmp` on `index` into range arguments.
pub fn resolve(model: &ModelSpec, index: &IndexModel, cmp: &Cmp) -> Result<IndexRange, Error> {
    let key = model.index_key(index);

    if index.kind.is_scored() {
        Ok(IndexRange::Score {
            key,
            range: score_range(index, cmp)?,
        })
    } else {
        Ok(IndexRange::Lex {
            key,
            range: lex_range(index, cmp)?,
        })
    }
}

/// Range covering every entry of `index`.
#[must_use]
pub fn full_range(model: &ModelSpec, index: &IndexModel) -> IndexRange {
    let key = model.index_key(index);

    if index.kind.is_scored() {
        IndexRange::Score {
            key,
            range: ScoreRange::full(),
        }
    } else {
        IndexRange::Lex {
            key,
            range: LexRange::full(),
        }
    }
}

fn score_range(index: &IndexModel, cmp: &Cmp) -> Result<ScoreRange, Error> {
    let score = |value: &Value| encode_score(index, value);

    let range = match cmp {
        Cmp::Eq(value) => {
            let s = score(value)?;
            ScoreRange::new(ScoreBound::Included(s), ScoreBound::Included(s))
        }
        Cmp::Gt(value) => ScoreRange::new(ScoreBound::Excluded(score(value)?), ScoreBound::PosInf),
        Cmp::Gte(value) => ScoreRange::new(ScoreBound::Included(score(value)?), ScoreBound::PosInf),
        Cmp::Lt(value) => ScoreRange::new(ScoreBound::NegInf, ScoreBound::Excluded(score(value)?)),
        Cmp::Lte(value) => ScoreRange::new(ScoreBound::NegInf, ScoreBound::Included(score(value)?)),
        Cmp::Between(low, high) => ScoreRange::new(
            ScoreBound::Included(score(low)?),
            ScoreBound::Included(score(high)?),
        ),
    };

    Ok(range)
}

// NUL is the smallest byte, so `value + NUL` precedes every member holding a
// greater value and `value + NUL + 0xFF` follows every member holding `value`.
fn lex_range(index: &IndexModel, cmp: &Cmp) -> Result<LexRange, Error> {
    let floor = |value: &Value| encode_lex(index, value).map(value_floor);
    let ceiling = |value: &Value| encode_lex(index, value).map(value_ceiling);

    let range = match cmp {
        Cmp::Eq(value) => LexRange::new(
            LexBound::Included(floor(value)?),
            LexBound::Included(ceiling(value)?),
        ),
        Cmp::Gt(value) => LexRange::new(LexBound::Excluded(ceiling(value)?), LexBound::Max),
        Cmp::Gte(value) => LexRange::new(LexBound::Included(floor(value)?), LexBound::Max),
        Cmp::Lt(value) => LexRange::new(LexBound::Min, LexBound::Excluded(floor(value)?)),
        Cmp::Lte(value) => LexRange::new(LexBound::Min, LexBound::Included(ceiling(value)?)),
        Cmp::Between(low, high) => LexRange::new(
            LexBound::Included(floor(low)?),
            LexBound::Included(ceiling(high)?),
        ),
    };

    Ok(range)
}

fn value_floor(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.push(INDEX_SEPARATOR);
    bytes
}

fn value_ceiling(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.extend_from_slice(&[INDEX_SEPARATOR, MEMBER_CEILING]);
    bytes
}

///
/// TESTS
///
