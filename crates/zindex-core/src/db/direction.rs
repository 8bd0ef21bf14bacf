use serde::{Deserialize, Serialize};

///
/// Direction
///
/// Retrieval direction over an ordered structure. Descending reverses the
/// store read itself; results are never reversed after the fact.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn is_desc(self) -> bool {
        matches!(self, Self::Desc)
    }
}
