//! Entity-registry declaration errors.
//!
//! Maps directly onto the declaration-time failures named by the schema
//! model: duplicate tables, unknown identifying names, and entities without
//! exactly one primary key.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("entity '{schema}.{name}' is already registered")]
    DuplicateTable { schema: String, name: String },

    #[error("entity '{entity}' declares unknown identifying name '{name}'")]
    UnknownIdentifier { entity: String, name: String },

    #[error("entity '{entity}' is abstract (table = false) and has no LoadEntity")]
    AbstractEntity { entity: String },

    #[error("entity '{entity}' must have exactly one primary key, found {found}")]
    PrimaryKeyArity { entity: String, found: usize },

    #[error("entity '{entity}' has no field named '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("entity '{entity}' foreign key '{column}' targets unknown entity '{target}'")]
    UnknownForeignKeyTarget {
        entity: String,
        column: String,
        target: String,
    },
}
