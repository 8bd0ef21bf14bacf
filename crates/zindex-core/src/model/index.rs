use crate::KEY_SEPARATOR;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// IndexKind
///
/// Storage shape of one index structure.
/// Numeric and Boolean indexes carry the value in the score; String indexes
/// carry it in the member, all at score zero.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum IndexKind {
    #[display("numeric")]
    Numeric,
    #[display("string")]
    String,
    #[display("boolean")]
    Boolean,
}

impl IndexKind {
    /// Whether entries of this kind are ordered by score rather than by member bytes.
    #[must_use]
    pub const fn is_scored(self) -> bool {
        matches!(self, Self::Numeric | Self::Boolean)
    }
}

///
/// IndexModel
/// Runtime-only descriptor for one indexed field of a model.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct IndexModel {
    pub field: String,
    pub redis_name: String,
    pub kind: IndexKind,
}

impl IndexModel {
    /// Build an index whose redis-visible name equals the field name.
    #[must_use]
    pub fn new(field: impl Into<String>, kind: IndexKind) -> Self {
        let field = field.into();

        Self {
            redis_name: field.clone(),
            field,
            kind,
        }
    }

    #[must_use]
    pub fn with_redis_name(mut self, redis_name: impl Into<String>) -> Self {
        self.redis_name = redis_name.into();
        self
    }

    #[must_use]
    pub fn numeric(field: impl Into<String>) -> Self {
        Self::new(field, IndexKind::Numeric)
    }

    #[must_use]
    pub fn string(field: impl Into<String>) -> Self {
        Self::new(field, IndexKind::String)
    }

    #[must_use]
    pub fn boolean(field: impl Into<String>) -> Self {
        Self::new(field, IndexKind::Boolean)
    }

    /// Store key of this index's ordered structure for `model`.
    #[must_use]
    pub fn store_key(&self, model: &str) -> String {
        format!("{model}{KEY_SEPARATOR}{}", self.redis_name)
    }
}

impl fmt::Display for IndexModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field == self.redis_name {
            write!(f, "{}({})", self.kind, self.field)
        } else {
            write!(f, "{}({} as {})", self.kind, self.field, self.redis_name)
        }
    }
}
