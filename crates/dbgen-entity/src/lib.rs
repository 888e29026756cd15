//! dbgen-entity: table/column/FK metadata and identifying-set inheritance.
//!
//! Scope:
//! - `entity`: `Entity`/`EntityBuilder`, the immutable table descriptor and
//!   its builder (no runtime metaclass machinery — §9).
//! - `load_entity`: `LoadEntity`, the flattened runtime view consumed by the
//!   executor's `Load` nodes.
//! - `field`: column type/nullability/default declarations.
//! - `registry`: the process-wide, declare-once table registry.
//! - `errors`: declaration-time error taxonomy (`EntityError`).

pub mod entity;
pub mod errors;
pub mod field;
pub mod load_entity;
pub mod registry;

pub use entity::{Entity, EntityBuilder, ForeignKeySpec};
pub use errors::EntityError;
pub use field::{FieldSpec, FieldType};
pub use load_entity::LoadEntity;
pub use registry::{clear_registry, declare, declare_entity, foreign_key_field, get, get_load_entity};
