use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{EntitySchema, ProxyError, Result};

/// Entity type metadata used for type inference.
///
/// Immutable once built: every mutation returns a new catalog, so clones can be
/// handed to accessors without locking.
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    entities: Arc<HashMap<String, EntitySchema>>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(HashMap::new()),
        }
    }

    /// Adds an entity type, returning a NEW catalog
    pub fn with_entity(self, schema: EntitySchema) -> Result<Self> {
        let name = schema.name().to_string();

        if self.entities.contains_key(&name) {
            return Err(ProxyError::invalid_configuration(
                name,
                "entity type is already registered",
            ));
        }

        // Copy-on-write
        let mut new_entities = (*self.entities).clone();
        new_entities.insert(name, schema);

        Ok(Self {
            entities: Arc::new(new_entities),
        })
    }

    pub fn get_entity(&self, name: &str) -> Result<&EntitySchema> {
        self.entities
            .get(name)
            .ok_or_else(|| ProxyError::EntityNotFound(name.to_string()))
    }

    pub fn entity_exists(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn list_entities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Removes an entity type, returning a NEW catalog
    pub fn without_entity(self, name: &str) -> Result<Self> {
        if !self.entities.contains_key(name) {
            return Err(ProxyError::EntityNotFound(name.to_string()));
        }

        let mut new_entities = (*self.entities).clone();
        new_entities.remove(name);

        Ok(Self {
            entities: Arc::new(new_entities),
        })
    }
}

impl Default for EntityCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, EntityMember};

    fn person() -> EntitySchema {
        EntitySchema::new("Person", vec![EntityMember::new("Id", DataType::Integer)])
    }

    #[test]
    fn test_copy_on_write() {
        let empty = EntityCatalog::new();
        let with_person = empty.clone().with_entity(person()).unwrap();

        assert!(!empty.entity_exists("Person"));
        assert!(with_person.entity_exists("Person"));
        assert_eq!(with_person.list_entities(), vec!["Person"]);

        let removed = with_person.clone().without_entity("Person").unwrap();
        assert!(!removed.entity_exists("Person"));
        assert!(with_person.get_entity("Person").is_ok());
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let catalog = EntityCatalog::new().with_entity(person()).unwrap();
        let err = catalog.with_entity(person()).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
