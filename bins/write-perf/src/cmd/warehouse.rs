use std::sync::Arc;

use storage_clickhouse::ClickHouseWarehouse;
use storage_memory::MemoryWarehouse;
use warehouse_api::WarehouseClient;

use super::config::{WarehouseConfig, config_json_or_empty};
use super::error::WritePerfError;

/// Instantiate the backend named by `[warehouse] storage`.
pub fn build_client(cfg: &WarehouseConfig) -> Result<Arc<dyn WarehouseClient>, WritePerfError> {
    let config_json = config_json_or_empty(&cfg.storage_config)?;
    let client: Arc<dyn WarehouseClient> = match cfg.storage.as_str() {
        "clickhouse" => Arc::new(ClickHouseWarehouse::from_config_json(&config_json)?),
        "memory" => Arc::new(MemoryWarehouse::from_config_json(&config_json)?),
        other => {
            return Err(WritePerfError::Config(format!(
                "unknown warehouse storage '{other}' (expected clickhouse or memory)"
            )));
        }
    };
    tracing::info!(storage = %cfg.storage, "warehouse client ready");
    Ok(client)
}
