use crate::{
    INDEX_SEPARATOR,
    db::index::codec::{encode_lex, encode_score},
    error::{Error, InvalidValueReason},
    model::index::{IndexKind, IndexModel},
    value::Value,
};

///
/// IndexEntry
///
/// The exact `(score, member)` pair one record contributes to one index.
/// Removal addresses the same member, so adds and removes stay symmetric.
///

#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub score: f64,
    pub member: Vec<u8>,
}

impl IndexEntry {
    /// Build the entry for `id` holding `value` in `index`.
    ///
    /// Scored indexes use the id as member and the encoded value as score.
    /// String indexes use `value + NUL + id` at score zero.
    pub fn new(index: &IndexModel, id: &str, value: &Value) -> Result<Self, Error> {
        validate_record_id(id).map_err(|reason| Error::invalid_value(index.to_string(), reason))?;

        match index.kind {
            IndexKind::Numeric | IndexKind::Boolean => Ok(Self {
                score: encode_score(index, value)?,
                member: id.as_bytes().to_vec(),
            }),
            IndexKind::String => {
                let mut member = encode_lex(index, value)?;
                member.reserve(id.len() + 1);
                member.push(INDEX_SEPARATOR);
                member.extend_from_slice(id.as_bytes());

                Ok(Self { score: 0.0, member })
            }
        }
    }

    /// Entry for the per-model all-ids structure.
    #[must_use]
    pub fn all_ids(id: &str) -> Self {
        Self {
            score: 0.0,
            member: id.as_bytes().to_vec(),
        }
    }
}

/// Ids double as string-index suffixes, so they may not carry the separator.
pub(crate) fn validate_record_id(id: &str) -> Result<(), InvalidValueReason> {
    if id.is_empty() || id.as_bytes().contains(&INDEX_SEPARATOR) {
        return Err(InvalidValueReason::InvalidRecordId);
    }

    Ok(())
}

///
/// TESTS
///
