use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use warehouse_api::{Record, TableRow, TableSchema, WarehouseError};

/// Schema of the output table: a single BYTES column.
pub const OUTPUT_SCHEMA: &str = r#"{"fields": [{"name": "data", "type": "BYTES"}]}"#;

pub fn output_schema() -> Result<TableSchema, WarehouseError> {
    TableSchema::from_json(OUTPUT_SCHEMA)
}

/// Row written by the `Format` step. `data` is the record value, base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedRow {
    pub data: String,
}

impl FormattedRow {
    pub fn from_record(record: &Record) -> Self {
        Self { data: STANDARD.encode(&record.value) }
    }
}

/// The `Format` transform. The key is dropped.
pub fn format_record(record: Record) -> Result<TableRow, WarehouseError> {
    TableRow::from_serialize(&FormattedRow::from_record(&record))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use warehouse_api::FieldType;

    use super::*;

    #[test]
    fn encodes_value_and_drops_key() {
        let row = format_record(Record::new(vec![9], vec![0x00, 0xff, 0x10])).unwrap();
        assert_eq!(row.into_value(), json!({ "data": "AP8Q" }));
    }

    #[test]
    fn empty_value_is_empty_string() {
        let row = format_record(Record::new(vec![1], Vec::new())).unwrap();
        assert_eq!(row.get("data"), Some(&json!("")));
    }

    #[test]
    fn rows_conform_to_output_schema() {
        let schema = output_schema().unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert_eq!(schema.field("data").unwrap().field_type, FieldType::Bytes);

        let row = format_record(Record::new(vec![1], vec![7; 1024])).unwrap();
        schema.validate_row(&row).unwrap();
    }
}
