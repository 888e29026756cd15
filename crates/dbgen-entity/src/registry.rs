//! Process-wide entity registry.
//!
//! One registry per process, mutated only during model declaration (before
//! any generator runs — §3 "Lifecycles"); runtime treats it as read-only,
//! so a concurrent map buys safe reads from parallel generator workers
//! without a global lock.

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::entity::{Entity, EntityBuilder};
use crate::errors::EntityError;
use crate::field::FieldSpec;
use crate::load_entity::LoadEntity;

type Key = (String, String);

static REGISTRY: Lazy<DashMap<Key, Entity>> = Lazy::new(DashMap::new);

/// Registers a fully-built entity. Fails with [`EntityError::DuplicateTable`]
/// if `(schema, name)` is already present.
pub fn declare_entity(entity: Entity) -> Result<(), EntityError> {
    let key = (entity.schema.clone(), entity.name.clone());
    if REGISTRY.contains_key(&key) {
        return Err(EntityError::DuplicateTable { schema: key.0, name: key.1 });
    }
    REGISTRY.insert(key, entity);
    Ok(())
}

/// Convenience: build `builder` and declare it in one step.
pub fn declare(builder: EntityBuilder) -> Result<Entity, EntityError> {
    let entity = builder.build()?;
    declare_entity(entity.clone())?;
    Ok(entity)
}

pub fn get(schema: &str, name: &str) -> Option<Entity> {
    REGISTRY.get(&(schema.to_string(), name.to_string())).map(|e| e.clone())
}

/// Returns a [`FieldSpec`] referencing `target`'s primary key column, for
/// use as a foreign key field on another entity (§4.1 `foreign_key`).
pub fn foreign_key_field(target: &Entity) -> Result<FieldSpec, EntityError> {
    let pk = target
        .fields
        .iter()
        .find(|(_, spec)| spec.primary_key)
        .map(|(_, spec)| spec.clone())
        .ok_or_else(|| EntityError::PrimaryKeyArity { entity: target.fulltablename(), found: 0 })?;
    Ok(pk)
}

pub fn get_load_entity(schema: &str, name: &str) -> Result<LoadEntity, EntityError> {
    let entity = get(schema, name).ok_or_else(|| EntityError::UnknownField {
        entity: format!("{}.{}", schema, name),
        field: "<table>".to_string(),
    })?;
    entity.load_entity()
}

/// Drops all entities. Used by tests that declare overlapping schemas
/// across cases (mirrors the source's `clear_registry`).
pub fn clear_registry() {
    REGISTRY.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;

    fn sample(name: &str) -> EntityBuilder {
        EntityBuilder::new(name).field("label", FieldSpec::new(FieldType::Text)).identifying(["label"])
    }

    #[test]
    fn declares_and_resolves_load_entity() {
        clear_registry();
        declare(sample("widget")).unwrap();
        let le = get_load_entity("public", "widget").unwrap();
        assert_eq!(le.primary_key_name, "id");
        assert!(le.identifying_attributes.contains_key("label"));
        clear_registry();
    }

    #[test]
    fn duplicate_table_rejected() {
        clear_registry();
        declare(sample("gizmo")).unwrap();
        let err = declare(sample("gizmo"));
        assert!(matches!(err, Err(EntityError::DuplicateTable { .. })));
        clear_registry();
    }

    #[test]
    fn unknown_identifier_rejected() {
        clear_registry();
        let built = EntityBuilder::new("thingy").identifying(["missing"]).build();
        assert!(matches!(built, Err(EntityError::UnknownIdentifier { .. })));
    }

    #[test]
    fn identifying_inheritance_is_union() {
        clear_registry();
        let base = EntityBuilder::new("base_kind")
            .abstract_base()
            .field("kind", FieldSpec::new(FieldType::Text))
            .identifying(["kind"])
            .build()
            .unwrap();
        let derived = EntityBuilder::new("derived_kind")
            .inherit_from(&base)
            .field("label", FieldSpec::new(FieldType::Text))
            .identifying(["label"])
            .build()
            .unwrap();
        assert!(derived.identifying.contains("kind"));
        assert!(derived.identifying.contains("label"));
        assert!(derived.fields.contains_key("kind"));
    }
}
