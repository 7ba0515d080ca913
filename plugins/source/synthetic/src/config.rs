use serde::{Deserialize, Serialize};

use warehouse_api::WarehouseError;

/// Input options of the synthetic source, in the snake_case JSON form
/// accepted on the command line:
///
/// `{"num_records": 1024, "key_size": 1, "value_size": 1024}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyntheticSourceConfig {
    /// Number of records to produce.
    pub num_records: u64,
    /// Key length in bytes. Required, but the content carries no meaning.
    pub key_size: usize,
    /// Value length in bytes.
    pub value_size: usize,
    /// Number of distinct hot keys (0 = no hot keys).
    #[serde(default)]
    pub num_hot_keys: u64,
    /// Fraction of records that get one of the hot keys.
    #[serde(default)]
    pub hot_key_fraction: f64,
    /// Number of partitions read in parallel (0 = single partition).
    #[serde(default)]
    pub force_initial_num_bundles: usize,
    #[serde(default)]
    pub seed: u64,
}

impl SyntheticSourceConfig {
    pub fn new(num_records: u64, key_size: usize, value_size: usize) -> Self {
        Self {
            num_records,
            key_size,
            value_size,
            num_hot_keys: 0,
            hot_key_fraction: 0.0,
            force_initial_num_bundles: 0,
            seed: 0,
        }
    }

    /// Parse the JSON form. Missing `num_records`, `key_size` or
    /// `value_size` is a config error.
    pub fn from_json(json: &str) -> Result<Self, WarehouseError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| WarehouseError::config(format!("input options: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WarehouseError> {
        if self.key_size == 0 {
            return Err(WarehouseError::config("input options: key_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.hot_key_fraction) {
            return Err(WarehouseError::config(format!(
                "input options: hot_key_fraction must be within [0, 1], got {}",
                self.hot_key_fraction
            )));
        }
        if self.hot_key_fraction > 0.0 && self.num_hot_keys == 0 {
            return Err(WarehouseError::config(
                "input options: hot_key_fraction needs num_hot_keys > 0",
            ));
        }
        Ok(())
    }

    /// Total payload bytes the source will produce, saturating at `u64::MAX`.
    pub fn total_bytes(&self) -> u64 {
        (self.key_size as u64)
            .saturating_add(self.value_size as u64)
            .saturating_mul(self.num_records)
    }
}
