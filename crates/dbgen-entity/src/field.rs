//! Field types supported by an [`crate::entity::Entity`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A column's semantic type. Not meant to cover every SQL type — only the
/// ones needed to coerce/validate a `Load`'s input values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Uuid,
    Text,
    Int,
    Float,
    Bool,
    Timestamp,
    Json,
}

impl FieldType {
    /// Checks that `value` is consistent with this type. Does not coerce;
    /// only rejects obvious mismatches (e.g. a string where an integer was
    /// expected).
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Uuid | FieldType::Text | FieldType::Timestamp => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Json => true,
        }
    }

    /// The Postgres cast suffix for reading this column's value back out of
    /// a `TEXT`-typed staging column (`flush_load_batch`'s temp table).
    pub fn sql_cast(&self) -> &'static str {
        match self {
            FieldType::Uuid => "::uuid",
            FieldType::Text => "::text",
            FieldType::Int => "::int8",
            FieldType::Float => "::float8",
            FieldType::Bool => "::boolean",
            FieldType::Timestamp => "::timestamptz",
            FieldType::Json => "::jsonb",
        }
    }
}

/// A column declaration: type, nullability and default value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub ty: FieldType,
    pub nullable: bool,
    pub default: Option<Value>,
    /// Marks the column as the table's primary key (UUID, §3).
    pub primary_key: bool,
}

impl FieldSpec {
    pub fn new(ty: FieldType) -> Self {
        Self { ty, nullable: false, default: None, primary_key: false }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.ty = FieldType::Uuid;
        self
    }
}
