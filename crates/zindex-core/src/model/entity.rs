use crate::{ALL_IDS_NAME, KEY_SEPARATOR, model::index::IndexModel};
use serde::{Deserialize, Serialize};

///
/// ModelSpec
///
/// Registration-time descriptor for one record type: its name (the key
/// namespace) and the ordered list of indexed fields.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ModelSpec {
    pub name: String,
    pub indexes: Vec<IndexModel>,
}

impl ModelSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn index(mut self, index: IndexModel) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up the index declared on `field`, if any.
    #[must_use]
    pub fn index_for(&self, field: &str) -> Option<&IndexModel> {
        self.indexes.iter().find(|index| index.field == field)
    }

    /// Store key of the structure holding every live record id of this model.
    #[must_use]
    pub fn all_ids_key(&self) -> String {
        format!("{}{KEY_SEPARATOR}{ALL_IDS_NAME}", self.name)
    }

    /// Store key of the index structure for `index`.
    #[must_use]
    pub fn index_key(&self, index: &IndexModel) -> String {
        index.store_key(&self.name)
    }
}
