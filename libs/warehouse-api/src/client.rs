use std::future::Future;
use std::pin::Pin;

use crate::error::WarehouseError;
use crate::record::TableRow;
use crate::schema::TableSchema;
use crate::table::{TableInfo, TableRef};

pub type WarehouseFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, WarehouseError>> + Send + 'a>>;

/// Warehouse backend. The pipeline sink and the load test cleanup only
/// see this trait.
///
/// Backends: clickhouse (HTTP), memory (in-process).
pub trait WarehouseClient: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Look up a table. `Ok(None)` when it does not exist.
    fn get_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, Option<TableInfo>>;

    /// Create a table. Fails with `Conflict` if it already exists.
    fn create_table<'a>(&'a self, table: &'a TableRef, schema: &'a TableSchema) -> WarehouseFuture<'a, ()>;

    /// Append rows. Rows are expected to be validated against the schema.
    fn insert_rows<'a>(&'a self, table: &'a TableRef, rows: &'a [TableRow]) -> WarehouseFuture<'a, ()>;

    /// Remove all rows, keeping the table and its schema.
    fn truncate_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()>;

    /// Delete a table. Fails with `NotFound` if it does not exist.
    fn delete_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()>;
}
