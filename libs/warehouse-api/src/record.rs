use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;

/// Key/value record produced by a source.
///
/// `key` is an opaque fixed-size token, `value` the payload blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Total payload size in bytes (key + value).
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// One row written to a warehouse table: a JSON object keyed by column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRow(serde_json::Map<String, serde_json::Value>);

impl TableRow {
    pub fn new() -> Self {
        Self(serde_json::Map::new())
    }

    /// Build a row from any value that serializes to a JSON object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, WarehouseError> {
        Self::try_from(serde_json::to_value(value)?)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: serde_json::Value) {
        self.0.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.0.get(column)
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }
}

impl TryFrom<serde_json::Value> for TableRow {
    type Error = WarehouseError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Self(map)),
            other => Err(WarehouseError::format(format!(
                "table row must be a JSON object, got {other}"
            ))),
        }
    }
}
