use crate::{ALL_IDS_NAME, KEY_SEPARATOR, error::ErrorClass, model::entity::ModelSpec};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("model '{0}' already registered")]
    NameAlreadyRegistered(String),

    #[error("model '{0}' not registered")]
    NameNotRegistered(String),

    #[error("model '{model}' declares more than one index on field '{field}'")]
    DuplicateIndexField { model: String, field: String },

    #[error("model '{model}' declares more than one index named '{name}'")]
    DuplicateIndexName { model: String, name: String },

    #[error("model '{model}' uses the reserved index name '{ALL_IDS_NAME}'")]
    ReservedIndexName { model: String },

    #[error("model name must be non-empty")]
    EmptyModelName,

    #[error("name '{name}' in model '{model}' contains the key separator '{KEY_SEPARATOR}'")]
    KeySeparatorInName { model: String, name: String },
}

impl RegistryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::NameAlreadyRegistered(_) => ErrorClass::Conflict,
            Self::NameNotRegistered(_) => ErrorClass::NotFound,
            Self::DuplicateIndexField { .. }
            | Self::DuplicateIndexName { .. }
            | Self::ReservedIndexName { .. }
            | Self::EmptyModelName
            | Self::KeySeparatorInName { .. } => ErrorClass::InvalidInput,
        }
    }
}

///
/// ModelRegistry
///
/// Explicit name -> descriptor map for every indexed model.
/// Owned by `Db`; there is no process-wide registry.
///

#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelSpec>,
}

impl ModelRegistry {
    /// Create an empty model registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` under its name after validating its index layout.
    pub fn register(&mut self, model: ModelSpec) -> Result<(), RegistryError> {
        validate(&model)?;
        if self.models.contains_key(&model.name) {
            return Err(RegistryError::NameAlreadyRegistered(model.name));
        }

        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    /// Remove and return the model registered as `name`.
    pub fn unregister(&mut self, name: &str) -> Result<ModelSpec, RegistryError> {
        self.models
            .remove(name)
            .ok_or_else(|| RegistryError::NameNotRegistered(name.to_string()))
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> Result<&ModelSpec, RegistryError> {
        self.models
            .get(name)
            .ok_or_else(|| RegistryError::NameNotRegistered(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

// Index keys live under the model name, so fields and store names must be
// unique and may not shadow the all-ids structure. A separator inside either
// segment would let two models resolve to the same key.
fn validate(model: &ModelSpec) -> Result<(), RegistryError> {
    if model.name.is_empty() {
        return Err(RegistryError::EmptyModelName);
    }
    if model.name.contains(KEY_SEPARATOR) {
        return Err(RegistryError::KeySeparatorInName {
            model: model.name.clone(),
            name: model.name.clone(),
        });
    }

    let mut fields = BTreeSet::new();
    let mut names = BTreeSet::new();
    for index in &model.indexes {
        if !fields.insert(index.field.as_str()) {
            return Err(RegistryError::DuplicateIndexField {
                model: model.name.clone(),
                field: index.field.clone(),
            });
        }
        if index.redis_name.contains(KEY_SEPARATOR) {
            return Err(RegistryError::KeySeparatorInName {
                model: model.name.clone(),
                name: index.redis_name.clone(),
            });
        }
        if index.redis_name == ALL_IDS_NAME {
            return Err(RegistryError::ReservedIndexName {
                model: model.name.clone(),
            });
        }
        if !names.insert(index.redis_name.as_str()) {
            return Err(RegistryError::DuplicateIndexName {
                model: model.name.clone(),
                name: index.redis_name.clone(),
            });
        }
    }

    Ok(())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::index::IndexModel, test_support::person_model};

    #[test]
    fn register_then_get_and_unregister() {
        let mut registry = ModelRegistry::new();
        registry.register(person_model()).unwrap();

        assert_eq!(registry.get("person").unwrap().indexes.len(), 3);
        assert_eq!(registry.len(), 1);

        let removed = registry.unregister("person").unwrap();
        assert_eq!(removed.name, "person");
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.register(person_model()).unwrap();

        let err = registry.register(person_model()).unwrap_err();
        assert_eq!(err, RegistryError::NameAlreadyRegistered("person".to_string()));
        assert_eq!(err.class(), ErrorClass::Conflict);
    }

    #[test]
    fn unknown_names_are_not_found() {
        let mut registry = ModelRegistry::new();

        assert_eq!(
            registry.unregister("ghost").unwrap_err(),
            RegistryError::NameNotRegistered("ghost".to_string())
        );
        assert_eq!(
            registry.get("ghost").unwrap_err().class(),
            ErrorClass::NotFound
        );
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        let mut registry = ModelRegistry::new();

        let duplicate = ModelSpec::new("a")
            .index(IndexModel::numeric("age"))
            .index(IndexModel::string("age"));
        assert!(matches!(
            registry.register(duplicate),
            Err(RegistryError::DuplicateIndexField { .. })
        ));

        let reserved = ModelSpec::new("b").index(IndexModel::numeric("all"));
        assert!(matches!(
            registry.register(reserved),
            Err(RegistryError::ReservedIndexName { .. })
        ));

        let renamed = ModelSpec::new("c")
            .index(IndexModel::numeric("age").with_redis_name("x"))
            .index(IndexModel::numeric("height").with_redis_name("x"));
        assert!(matches!(
            registry.register(renamed),
            Err(RegistryError::DuplicateIndexName { .. })
        ));

        assert_eq!(
            registry.register(ModelSpec::new("")),
            Err(RegistryError::EmptyModelName)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn separator_in_names_cannot_alias_another_models_keys() {
        let mut registry = ModelRegistry::new();

        // "a" + "b:c" and "a:b" + "c" would both own "a:b:c".
        let nested_index =
            ModelSpec::new("a").index(IndexModel::numeric("x").with_redis_name("b:c"));
        let nested_model = ModelSpec::new("a:b").index(IndexModel::numeric("c"));
        let shadows_all =
            ModelSpec::new("a").index(IndexModel::numeric("x").with_redis_name("b:all"));

        for model in [nested_index, nested_model, shadows_all] {
            let err = registry.register(model).unwrap_err();
            assert!(matches!(err, RegistryError::KeySeparatorInName { .. }));
            assert_eq!(err.class(), ErrorClass::InvalidInput);
        }
        assert!(registry.is_empty());

        registry
            .register(ModelSpec::new("a").index(IndexModel::numeric("c")))
            .unwrap();
        assert!(registry.contains("a"));
    }
}
