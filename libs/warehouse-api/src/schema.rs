use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;
use crate::record::TableRow;

/// Column type as declared in a table schema.
///
/// Names follow the warehouse's legacy and standard SQL spellings, so
/// both `INTEGER` and `INT64` parse to [`FieldType::Integer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    /// Binary data, carried in rows as a base64 string.
    Bytes,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Numeric,
}

impl FieldType {
    pub fn parse(s: &str) -> Result<Self, WarehouseError> {
        match s.to_ascii_uppercase().as_str() {
            "STRING" => Ok(FieldType::String),
            "BYTES" => Ok(FieldType::Bytes),
            "INTEGER" | "INT64" => Ok(FieldType::Integer),
            "FLOAT" | "FLOAT64" => Ok(FieldType::Float),
            "BOOLEAN" | "BOOL" => Ok(FieldType::Boolean),
            "TIMESTAMP" => Ok(FieldType::Timestamp),
            "NUMERIC" => Ok(FieldType::Numeric),
            other => Err(WarehouseError::schema(format!("unknown field type '{other}'"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Bytes => "BYTES",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Numeric => "NUMERIC",
        }
    }

    /// Check a single (non-null, non-repeated) JSON value against this type.
    fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Bytes, Value::String(s)) => {
                base64::engine::general_purpose::STANDARD.decode(s).is_ok()
            }
            (FieldType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Integer, Value::String(s)) => s.parse::<i64>().is_ok(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::Float, Value::String(s)) => s.parse::<f64>().is_ok(),
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Timestamp, Value::String(_) | Value::Number(_)) => true,
            (FieldType::Numeric, Value::String(_) | Value::Number(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

impl FieldMode {
    pub fn parse(s: &str) -> Result<Self, WarehouseError> {
        match s.to_ascii_uppercase().as_str() {
            "NULLABLE" => Ok(FieldMode::Nullable),
            "REQUIRED" => Ok(FieldMode::Required),
            "REPEATED" => Ok(FieldMode::Repeated),
            other => Err(WarehouseError::schema(format!("unknown field mode '{other}'"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMode::Nullable => "NULLABLE",
            FieldMode::Required => "REQUIRED",
            FieldMode::Repeated => "REPEATED",
        }
    }
}

/// A single column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub mode: FieldMode,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
        }
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Table schema. Field order is the column order used for DDL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    pub fields: Vec<Field>,
}

// Wire shape of the JSON schema declaration:
// {"fields": [{"name": "data", "type": "BYTES", "mode": "NULLABLE"}]}
#[derive(Serialize, Deserialize)]
struct RawSchema {
    fields: Vec<RawField>,
}

#[derive(Serialize, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
}

impl TableSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Parse a schema declared as JSON.
    pub fn from_json(json: &str) -> Result<Self, WarehouseError> {
        let raw: RawSchema = serde_json::from_str(json)
            .map_err(|e| WarehouseError::schema(format!("bad schema json: {e}")))?;
        if raw.fields.is_empty() {
            return Err(WarehouseError::schema("schema declares no fields"));
        }

        let mut fields = Vec::with_capacity(raw.fields.len());
        for f in raw.fields {
            if f.name.is_empty() {
                return Err(WarehouseError::schema("field with empty name"));
            }
            // Field names end up inside DDL, same rule as dataset and table names.
            if !f.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(WarehouseError::schema(format!(
                    "field name '{}' may only contain letters, digits and '_'",
                    f.name
                )));
            }
            if fields.iter().any(|existing: &Field| existing.name == f.name) {
                return Err(WarehouseError::schema(format!("duplicate field '{}'", f.name)));
            }
            let field_type = FieldType::parse(&f.field_type)?;
            let mode = match f.mode {
                Some(ref m) => FieldMode::parse(m)?,
                None => FieldMode::Nullable,
            };
            fields.push(Field { name: f.name, field_type, mode });
        }
        Ok(Self { fields })
    }

    /// Render back to the JSON declaration form.
    pub fn to_json(&self) -> String {
        let raw = RawSchema {
            fields: self
                .fields
                .iter()
                .map(|f| RawField {
                    name: f.name.clone(),
                    field_type: f.field_type.as_str().to_string(),
                    mode: Some(f.mode.as_str().to_string()),
                })
                .collect(),
        };
        // RawSchema only holds strings, serialization cannot fail.
        serde_json::to_string(&raw).unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a row against the schema.
    ///
    /// Rejects fields the schema doesn't declare, missing REQUIRED fields,
    /// values of the wrong JSON type and BYTES values that are not base64.
    pub fn validate_row(&self, row: &TableRow) -> Result<(), WarehouseError> {
        for name in row.as_map().keys() {
            if self.field(name).is_none() {
                return Err(WarehouseError::format(format!("no such field: {name}")));
            }
        }

        for field in &self.fields {
            let value = row.get(&field.name);
            match (field.mode, value) {
                (FieldMode::Required, None | Some(serde_json::Value::Null)) => {
                    return Err(WarehouseError::format(format!(
                        "missing required field: {}",
                        field.name
                    )));
                }
                (_, None | Some(serde_json::Value::Null)) => {}
                (FieldMode::Repeated, Some(serde_json::Value::Array(items))) => {
                    if let Some(bad) = items.iter().find(|v| !field.field_type.accepts(v)) {
                        return Err(type_mismatch(field, bad));
                    }
                }
                (FieldMode::Repeated, Some(other)) => {
                    return Err(WarehouseError::format(format!(
                        "field {} is REPEATED, got {}",
                        field.name,
                        json_kind(other)
                    )));
                }
                (_, Some(v)) => {
                    if !field.field_type.accepts(v) {
                        return Err(type_mismatch(field, v));
                    }
                }
            }
        }
        Ok(())
    }
}

fn type_mismatch(field: &Field, value: &serde_json::Value) -> WarehouseError {
    WarehouseError::format(format!(
        "field {} expects {}, got {}",
        field.name,
        field.field_type,
        json_kind(value)
    ))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
