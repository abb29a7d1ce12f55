//! Model schemas and records.
//!
//! A [`ModelSchema`] describes a table: its name and ordered field
//! descriptors. A [`Record`] is one row-in-memory: a value per field plus a
//! validation-error map. Setting a field to a value of the wrong type
//! records an error but keeps the raw value, so a half-valid record stays
//! constructable and inspectable.

use crate::ast::{FieldRef, ScalarValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use wordlette_core::Nullable;

/// Storable field types, with their sqlite column affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Real,
    Text,
    Bool,
}

impl FieldType {
    /// The column type used in generated DDL. Anything without a tighter
    /// mapping stores as TEXT.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Int | FieldType::Bool => "INTEGER",
            FieldType::Real => "REAL",
            FieldType::Text => "TEXT",
        }
    }

    /// Whether a scalar is storable in a column of this type. `Null` is
    /// accepted everywhere.
    pub fn accepts(&self, value: &ScalarValue) -> bool {
        matches!(
            (self, value),
            (_, ScalarValue::Null)
                | (FieldType::Int, ScalarValue::Int(_))
                | (FieldType::Real, ScalarValue::Real(_))
                | (FieldType::Text, ScalarValue::Text(_))
                | (FieldType::Bool, ScalarValue::Bool(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A model's table name and ordered field descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema {
    pub table: String,
    pub fields: Vec<FieldDef>,
}

impl ModelSchema {
    pub fn new(table: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            table: table.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// A query-AST reference to one of this model's fields.
    pub fn field_ref(&self, name: &str) -> Option<FieldRef> {
        self.field(name)
            .map(|f| FieldRef::new(self.table.clone(), f.name.clone()))
    }

    /// The auto-chosen primary key: the first field literally named "id"
    /// (case-insensitive), else the first Int field, else the first
    /// declared field.
    pub fn primary_key(&self) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case("id"))
            .or_else(|| self.fields.iter().find(|f| f.ty == FieldType::Int))
            .or_else(|| self.fields.first())
    }

    /// Fields in statement order: primary key first, the rest in
    /// declaration order. CREATE TABLE and INSERT agree on this ordering.
    pub fn ordered_fields(&self) -> Vec<&FieldDef> {
        let Some(pk) = self.primary_key() else {
            return Vec::new();
        };
        let mut ordered = vec![pk];
        ordered.extend(self.fields.iter().filter(|f| f.name != pk.name));
        ordered
    }
}

/// One model instance: field values plus per-field validation errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<ModelSchema>,
    values: BTreeMap<String, ScalarValue>,
    errors: BTreeMap<String, String>,
}

impl Record {
    /// A record with every declared field set to `Null`.
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        let values = schema
            .fields
            .iter()
            .map(|f| (f.name.clone(), ScalarValue::Null))
            .collect();
        Self {
            schema,
            values,
            errors: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Set a field, validating against its declared type. A mismatched or
    /// unknown field records an error; the raw value is kept so callers
    /// can still inspect what was submitted.
    pub fn set(&mut self, field: &str, value: impl Into<ScalarValue>) -> &mut Self {
        let value = value.into();
        match self.schema.field(field) {
            Some(def) if def.ty.accepts(&value) => {
                self.errors.remove(field);
            }
            Some(def) => {
                self.errors.insert(
                    field.to_string(),
                    format!("expected {:?}, got {value:?}", def.ty),
                );
            }
            None => {
                self.errors
                    .insert(field.to_string(), "unknown field".to_string());
            }
        }
        self.values.insert(field.to_string(), value);
        self
    }

    /// The field's current value; absent fields come back as `Null`
    /// carrying no cause.
    pub fn get(&self, field: &str) -> Nullable<ScalarValue> {
        self.values.get(field).cloned().into()
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Snapshot the value map.
    pub fn to_values(&self) -> BTreeMap<String, ScalarValue> {
        self.values.clone()
    }

    /// Reconstruct a record from a value map; validation re-runs per
    /// field, so errors in the source data resurface.
    pub fn from_values(schema: Arc<ModelSchema>, values: BTreeMap<String, ScalarValue>) -> Self {
        let mut record = Self::new(schema);
        for (field, value) in values {
            record.set(&field, value);
        }
        record
    }
}

/// All models known to one application, registered at bootstrap.
///
/// Schema sync iterates this registry; nothing registers itself.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    schemas: Vec<Arc<ModelSchema>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ModelSchema) -> Arc<ModelSchema> {
        let schema = Arc::new(schema);
        self.schemas.push(schema.clone());
        schema
    }

    pub fn get(&self, table: &str) -> Option<&Arc<ModelSchema>> {
        self.schemas.iter().find(|s| s.table == table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelSchema>> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
