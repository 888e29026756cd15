//! `Entity`: declared logical table with an identifying subset.
//!
//! Follows the source pattern mandated for this subsystem (§9 "Dynamic
//! class construction / metaclass-driven entity declaration"): no runtime
//! metaclass or reflection magic. A [`EntityBuilder`] assembles an immutable
//! [`Entity`] descriptor which is then registered into the process-wide
//! registry (`crate::registry`).

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::EntityError;
use crate::field::FieldSpec;
use crate::load_entity::LoadEntity;

/// A foreign key column referencing another entity's primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub column: String,
    pub target_entity: String,
    pub target_schema: String,
}

/// An immutable, fully-resolved table descriptor.
///
/// Identifying-set, hash-include and hash-exclude inheritance is resolved
/// once, at build time, by unioning the corresponding sets from every base
/// passed to [`EntityBuilder::inherit_from`]; `schema` inherits last-wins
/// (the most-derived base's schema, if any base set one, otherwise the
/// builder's own value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub schema: String,
    pub fields: IndexMap<String, FieldSpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
    pub identifying: BTreeSet<String>,
    pub hash_include: BTreeSet<String>,
    pub hash_exclude: BTreeSet<String>,
    /// Whether this entity corresponds to a real table (vs. an abstract
    /// base used only for inheritance).
    pub table: bool,
}

impl Entity {
    pub fn fulltablename(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    fn primary_key_field(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.primary_key)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Produce the flattened runtime view used by the executor. Fails if
    /// the entity is abstract or does not have exactly one primary key
    /// (§4.1).
    pub fn load_entity(&self) -> Result<LoadEntity, EntityError> {
        if !self.table {
            return Err(EntityError::AbstractEntity { entity: self.fulltablename() });
        }
        let pks = self.primary_key_field();
        if pks.len() != 1 {
            return Err(EntityError::PrimaryKeyArity {
                entity: self.fulltablename(),
                found: pks.len(),
            });
        }
        let primary_key_name = pks[0].to_string();

        let mut identifying_attributes = indexmap::IndexMap::new();
        let mut identifying_foreign_keys = Vec::new();
        for name in &self.identifying {
            if let Some(spec) = self.fields.get(name) {
                if !spec.primary_key {
                    identifying_attributes.insert(name.clone(), spec.ty);
                }
            } else if self.foreign_keys.iter().any(|fk| &fk.column == name) {
                identifying_foreign_keys.push(name.clone());
            } else {
                return Err(EntityError::UnknownIdentifier {
                    entity: self.fulltablename(),
                    name: name.clone(),
                });
            }
        }

        let attributes = self
            .fields
            .iter()
            .filter(|(_, spec)| !spec.primary_key)
            .map(|(name, spec)| (name.clone(), spec.ty))
            .collect();
        let foreign_keys = self.foreign_keys.iter().map(|fk| fk.column.clone()).collect();

        Ok(LoadEntity {
            name: self.name.clone(),
            schema: self.schema.clone(),
            primary_key_name,
            identifying_attributes,
            identifying_foreign_keys,
            attributes,
            foreign_keys,
        })
    }
}

/// Builds an [`Entity`] from a base set of fields/FKs plus zero or more
/// parents to inherit identifying/hash-include/hash-exclude sets from.
pub struct EntityBuilder {
    name: String,
    schema: Option<String>,
    fields: IndexMap<String, FieldSpec>,
    foreign_keys: Vec<ForeignKeySpec>,
    identifying: BTreeSet<String>,
    hash_include: BTreeSet<String>,
    hash_exclude: BTreeSet<String>,
    table: bool,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), FieldSpec::new(crate::field::FieldType::Uuid).primary_key());
        Self {
            name: name.into(),
            schema: None,
            fields,
            foreign_keys: Vec::new(),
            identifying: BTreeSet::new(),
            hash_include: BTreeSet::new(),
            hash_exclude: BTreeSet::new(),
            table: true,
        }
    }

    pub fn abstract_base(mut self) -> Self {
        self.table = false;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeySpec) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn identifying(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.identifying.extend(names.into_iter().map(Into::into));
        self
    }

    /// Union the identifying/hash-include/hash-exclude sets of `base` into
    /// this builder, and inherit `schema` if this builder has not set its
    /// own (last-wins: a later call to `.schema(...)` still takes priority
    /// because this only fills the slot when empty).
    pub fn inherit_from(mut self, base: &Entity) -> Self {
        self.identifying.extend(base.identifying.iter().cloned());
        self.hash_include.extend(base.hash_include.iter().cloned());
        self.hash_exclude.extend(base.hash_exclude.iter().cloned());
        if self.schema.is_none() {
            self.schema = Some(base.schema.clone());
        }
        for (name, spec) in &base.fields {
            self.fields.entry(name.clone()).or_insert_with(|| spec.clone());
        }
        for fk in &base.foreign_keys {
            if !self.foreign_keys.iter().any(|existing| existing.column == fk.column) {
                self.foreign_keys.push(fk.clone());
            }
        }
        self
    }

    /// Finalize the entity, validating that every identifying name
    /// resolves to a declared field or foreign key, and that every foreign
    /// key's identifying flag is reflected consistently.
    pub fn build(mut self) -> Result<Entity, EntityError> {
        let schema = self.schema.unwrap_or_else(|| "public".to_string());
        self.hash_include.extend(self.identifying.iter().cloned());

        for name in &self.identifying {
            let is_field = self.fields.contains_key(name);
            let is_fk = self.foreign_keys.iter().any(|fk| &fk.column == name);
            if !is_field && !is_fk {
                return Err(EntityError::UnknownIdentifier {
                    entity: format!("{}.{}", schema, self.name),
                    name: name.clone(),
                });
            }
        }

        for fk in &self.foreign_keys {
            if crate::registry::get(&fk.target_schema, &fk.target_entity).is_none() {
                return Err(EntityError::UnknownForeignKeyTarget {
                    entity: format!("{}.{}", schema, self.name),
                    column: fk.column.clone(),
                    target: format!("{}.{}", fk.target_schema, fk.target_entity),
                });
            }
        }

        Ok(Entity {
            name: self.name,
            schema,
            fields: self.fields,
            foreign_keys: self.foreign_keys,
            identifying: self.identifying,
            hash_include: self.hash_include,
            hash_exclude: self.hash_exclude,
            table: self.table,
        })
    }
}
