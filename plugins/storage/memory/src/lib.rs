use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use warehouse_api::client::WarehouseFuture;
use warehouse_api::{TableInfo, TableRef, TableRow, TableSchema, WarehouseClient, WarehouseError};

// ═══════════════════════════════════════════════════════════════
//  MemoryWarehouseConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_rows() -> usize {
    10_000_000
}

#[derive(Debug, serde::Deserialize)]
pub struct MemoryWarehouseConfig {
    /// Upper bound on rows held per table. Inserts past it fail.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

impl Default for MemoryWarehouseConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryWarehouse
// ═══════════════════════════════════════════════════════════════

struct MemTable {
    schema: TableSchema,
    rows: Vec<TableRow>,
}

/// In-process warehouse. Tables live for the lifetime of the value;
/// the project part of a `TableRef` is ignored.
pub struct MemoryWarehouse {
    tables: RwLock<HashMap<(String, String), MemTable>>,
    max_rows: usize,
    insert_calls: AtomicUsize,
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::with_config(MemoryWarehouseConfig::default())
    }

    pub fn with_config(config: MemoryWarehouseConfig) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            max_rows: config.max_rows,
            insert_calls: AtomicUsize::new(0),
        }
    }

    /// Build from a JSON config string (`"{}"` = defaults).
    pub fn from_config_json(config_json: &str) -> Result<Self, WarehouseError> {
        let config: MemoryWarehouseConfig = if config_json == "{}" {
            MemoryWarehouseConfig::default()
        } else {
            serde_json::from_str(config_json)
                .map_err(|e| WarehouseError::config(format!("memory warehouse config: {e}")))?
        };
        Ok(Self::with_config(config))
    }

    /// Snapshot of a table's rows in insertion order.
    pub async fn rows(&self, table: &TableRef) -> Option<Vec<TableRow>> {
        let tables = self.tables.read().await;
        tables.get(&key(table)).map(|t| t.rows.clone())
    }

    pub async fn schema(&self, table: &TableRef) -> Option<TableSchema> {
        let tables = self.tables.read().await;
        tables.get(&key(table)).map(|t| t.schema.clone())
    }

    /// Number of `insert_rows` calls accepted so far.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }
}

fn key(table: &TableRef) -> (String, String) {
    (table.dataset.clone(), table.table.clone())
}

impl WarehouseClient for MemoryWarehouse {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, Option<TableInfo>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.get(&key(table)).map(|t| TableInfo {
                table: table.clone(),
                num_rows: t.rows.len() as u64,
            }))
        })
    }

    fn create_table<'a>(&'a self, table: &'a TableRef, schema: &'a TableSchema) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let k = key(table);
            if tables.contains_key(&k) {
                return Err(WarehouseError::conflict(format!("table {table} already exists")));
            }
            tables.insert(k, MemTable { schema: schema.clone(), rows: Vec::new() });
            tracing::debug!(%table, "memory table created");
            Ok(())
        })
    }

    fn insert_rows<'a>(&'a self, table: &'a TableRef, rows: &'a [TableRow]) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let t = tables
                .get_mut(&key(table))
                .ok_or_else(|| WarehouseError::not_found(format!("table {table} not found")))?;

            if t.rows.len() + rows.len() > self.max_rows {
                return Err(WarehouseError::io(format!(
                    "table {table} would exceed max_rows ({})",
                    self.max_rows
                )));
            }
            // Whole request is rejected if any row is invalid.
            for (i, row) in rows.iter().enumerate() {
                t.schema
                    .validate_row(row)
                    .map_err(|e| e.with_context(format!("row {i}")))?;
            }
            t.rows.extend_from_slice(rows);
            self.insert_calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }

    fn truncate_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let t = tables
                .get_mut(&key(table))
                .ok_or_else(|| WarehouseError::not_found(format!("table {table} not found")))?;
            t.rows.clear();
            Ok(())
        })
    }

    fn delete_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            match tables.remove(&key(table)) {
                Some(_) => Ok(()),
                None => Err(WarehouseError::not_found(format!("table {table} does not exist"))),
            }
        })
    }
}
