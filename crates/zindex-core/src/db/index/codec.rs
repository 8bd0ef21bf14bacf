//! Module: index::codec
//! Responsibility: typed value -> index score / index bytes.
//! Does not own: member composition (see `entry`) or range lowering.

use crate::{
    INDEX_SEPARATOR,
    error::{Error, InvalidValueReason},
    model::index::{IndexKind, IndexModel},
    value::Value,
};

/// Encode `value` as the score of a Numeric or Boolean index.
///
/// Integers are cast to `f64`; magnitudes above 2^53 lose precision.
/// Booleans map to 1.0 / 0.0. NaN is rejected; `-0.0` becomes `0.0`.
pub fn encode_score(index: &IndexModel, value: &Value) -> Result<f64, Error> {
    let mismatch = || {
        Error::invalid_value(
            index.to_string(),
            InvalidValueReason::KindMismatch {
                expected: index.kind,
                found: value.kind_label(),
            },
        )
    };

    #[expect(clippy::cast_precision_loss)]
    let score = match (index.kind, value) {
        (IndexKind::Numeric | IndexKind::Boolean, Value::Bool(v)) => f64::from(u8::from(*v)),
        (IndexKind::Numeric, Value::Int(v)) => *v as f64,
        (IndexKind::Numeric, Value::Uint(v)) => *v as f64,
        (IndexKind::Numeric, Value::Float(v)) => *v,
        _ => return Err(mismatch()),
    };

    if score.is_nan() {
        return Err(Error::invalid_value(
            index.to_string(),
            InvalidValueReason::NotANumber,
        ));
    }

    Ok(if score == 0.0 { 0.0 } else { score })
}

/// Encode `value` as the sortable byte prefix of a String index member.
///
/// Ordering is plain byte order of the UTF-8 text. A value containing the
/// reserved separator is rejected.
pub fn encode_lex(index: &IndexModel, value: &Value) -> Result<Vec<u8>, Error> {
    let Value::Text(text) = value else {
        return Err(Error::invalid_value(
            index.to_string(),
            InvalidValueReason::KindMismatch {
                expected: IndexKind::String,
                found: value.kind_label(),
            },
        ));
    };
    if index.kind != IndexKind::String {
        return Err(Error::invalid_value(
            index.to_string(),
            InvalidValueReason::KindMismatch {
                expected: index.kind,
                found: value.kind_label(),
            },
        ));
    }
    if text.as_bytes().contains(&INDEX_SEPARATOR) {
        return Err(Error::invalid_value(
            index.to_string(),
            InvalidValueReason::ContainsSeparator,
        ));
    }

    Ok(text.as_bytes().to_vec())
}

/// Check a value against an index without producing its encoding.
pub fn validate(index: &IndexModel, value: &Value) -> Result<(), Error> {
    if index.kind.is_scored() {
        encode_score(index, value).map(|_| ())
    } else {
        encode_lex(index, value).map(|_| ())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    fn reason(err: Error) -> InvalidValueReason {
        match err {
            Error::InvalidIndexValue { reason, .. } => reason,
            other => panic!("expected InvalidIndexValue, got {other:?}"),
        }
    }

    #[test]
    fn numeric_values_cast_to_scores() {
        let index = IndexModel::numeric("age");

        assert_eq!(encode_score(&index, &Value::Int(-3)).unwrap(), -3.0);
        assert_eq!(encode_score(&index, &Value::Uint(7)).unwrap(), 7.0);
        assert_eq!(encode_score(&index, &Value::Float(1.5)).unwrap(), 1.5);
        assert_eq!(encode_score(&index, &Value::Bool(true)).unwrap(), 1.0);
    }

    #[test]
    fn boolean_index_maps_to_one_and_zero() {
        let index = IndexModel::boolean("active");

        assert_eq!(encode_score(&index, &Value::Bool(true)).unwrap(), 1.0);
        assert_eq!(encode_score(&index, &Value::Bool(false)).unwrap(), 0.0);
    }

    #[test]
    fn boolean_index_rejects_numbers() {
        let index = IndexModel::boolean("active");
        let err = encode_score(&index, &Value::Int(1)).unwrap_err();

        assert_eq!(err.class(), ErrorClass::InvalidInput);
        assert_eq!(
            reason(err),
            InvalidValueReason::KindMismatch {
                expected: IndexKind::Boolean,
                found: "int",
            }
        );
    }

    #[test]
    fn nan_is_rejected_and_negative_zero_is_normalized() {
        let index = IndexModel::numeric("ratio");

        let err = encode_score(&index, &Value::Float(f64::NAN)).unwrap_err();
        assert_eq!(reason(err), InvalidValueReason::NotANumber);

        let zero = encode_score(&index, &Value::Float(-0.0)).unwrap();
        assert!(zero.is_sign_positive());
    }

    #[test]
    fn text_encodes_to_raw_bytes() {
        let index = IndexModel::string("name");

        assert_eq!(
            encode_lex(&index, &Value::from("héllo")).unwrap(),
            "héllo".as_bytes()
        );
    }

    #[test]
    fn text_with_separator_is_rejected() {
        let index = IndexModel::string("name");
        let err = encode_lex(&index, &Value::from("bad\0value")).unwrap_err();

        assert_eq!(reason(err), InvalidValueReason::ContainsSeparator);
    }

    #[test]
    fn string_index_rejects_non_text() {
        let index = IndexModel::string("name");
        let err = encode_lex(&index, &Value::Int(3)).unwrap_err();

        assert_eq!(
            reason(err),
            InvalidValueReason::KindMismatch {
                expected: IndexKind::String,
                found: "int",
            }
        );
    }

    #[test]
    fn numeric_index_rejects_text() {
        let index = IndexModel::numeric("age");

        assert!(validate(&index, &Value::from("12")).is_err());
        assert!(validate(&index, &Value::Int(12)).is_ok());
    }
}
