pub mod client;
pub mod error;
pub mod record;
pub mod schema;
pub mod source;
pub mod table;

pub use client::WarehouseClient;
pub use error::{ErrorKind, WarehouseError};
pub use record::{Record, TableRow};
pub use schema::{Field, FieldMode, FieldType, TableSchema};
pub use source::{RecordReader, RecordSource};
pub use table::{CreateDisposition, TableInfo, TableRef, WriteDisposition};
