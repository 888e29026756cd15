//! `LoadEntity`: flattened, runtime-only view of an [`crate::entity::Entity`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::field::FieldType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadEntity {
    pub name: String,
    pub schema: String,
    pub primary_key_name: String,
    pub identifying_attributes: IndexMap<String, FieldType>,
    pub identifying_foreign_keys: Vec<String>,
    /// Every non-PK declared column, not just the identifying subset —
    /// needed to cast/validate a Load's full row, not only its identity.
    pub attributes: IndexMap<String, FieldType>,
    /// Every FK column, not just the identifying subset. Always `Uuid`.
    pub foreign_keys: Vec<String>,
}

impl LoadEntity {
    pub fn fulltablename(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    pub fn temp_table_name(&self) -> String {
        format!("{}_temp_load_table", self.name)
    }

    /// The declared type of `column`, if this entity has one. FK columns
    /// are reported as `Uuid` since they reference another table's primary
    /// key.
    pub fn column_type(&self, column: &str) -> Option<FieldType> {
        if self.foreign_keys.iter().any(|fk| fk == column) {
            return Some(FieldType::Uuid);
        }
        self.attributes.get(column).copied()
    }
}
