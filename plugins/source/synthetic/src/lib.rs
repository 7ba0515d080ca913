mod config;
mod rng;

pub use config::SyntheticSourceConfig;

use warehouse_api::{Record, RecordReader, RecordSource, WarehouseError};

use crate::rng::Rng;

/// Hot keys are drawn from their own stream so that every record with
/// hot key `k` gets the same bytes.
const HOT_KEY_SALT: u64 = 0x5EED_0F_407_4E75;

// ═══════════════════════════════════════════════════════════════
//  SyntheticSource
// ═══════════════════════════════════════════════════════════════

/// Bounded source of random key/value records.
///
/// Record `i` is a pure function of `(seed, i)`, so the stream does not
/// depend on how many partitions read it.
pub struct SyntheticSource {
    config: SyntheticSourceConfig,
}

impl SyntheticSource {
    pub fn new(config: SyntheticSourceConfig) -> Result<Self, WarehouseError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_json(json: &str) -> Result<Self, WarehouseError> {
        Self::new(SyntheticSourceConfig::from_json(json)?)
    }

    pub fn config(&self) -> &SyntheticSourceConfig {
        &self.config
    }

    /// The record at `index`. Indices past `num_records` are still
    /// defined, readers just never go there.
    pub fn record_at(&self, index: u64) -> Record {
        let cfg = &self.config;
        let mut rng = Rng::for_index(cfg.seed, index);

        let hot = cfg.num_hot_keys > 0 && rng.next_f64() < cfg.hot_key_fraction;
        let key = if hot {
            Rng::for_index(cfg.seed ^ HOT_KEY_SALT, index % cfg.num_hot_keys).bytes(cfg.key_size)
        } else {
            rng.bytes(cfg.key_size)
        };
        let value = rng.bytes(cfg.value_size);
        Record::new(key, value)
    }

    /// Index range `[start, end)` covered by `partition`.
    fn range(&self, partition: usize) -> (u64, u64) {
        let n = self.config.num_records as u128;
        let p = self.partitions() as u128;
        let i = partition as u128;
        ((i * n / p) as u64, ((i + 1) * n / p) as u64)
    }
}

impl RecordSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn partitions(&self) -> usize {
        self.config.force_initial_num_bundles.max(1)
    }

    fn estimated_records(&self) -> Option<u64> {
        Some(self.config.num_records)
    }

    fn open(&self, partition: usize) -> Result<Box<dyn RecordReader>, WarehouseError> {
        if partition >= self.partitions() {
            return Err(WarehouseError::logic(format!(
                "partition {partition} out of range (source has {})",
                self.partitions()
            )));
        }
        let (start, end) = self.range(partition);
        tracing::debug!(partition, start, end, "synthetic partition opened");
        Ok(Box::new(SyntheticReader {
            source: Self { config: self.config.clone() },
            next: start,
            end,
        }))
    }
}

struct SyntheticReader {
    source: SyntheticSource,
    next: u64,
    end: u64,
}

impl RecordReader for SyntheticReader {
    fn next_record(&mut self) -> Result<Option<Record>, WarehouseError> {
        if self.next >= self.end {
            return Ok(None);
        }
        let record = self.source.record_at(self.next);
        self.next += 1;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn drain(source: &SyntheticSource) -> Vec<Record> {
        let mut out = Vec::new();
        for p in 0..source.partitions() {
            let mut reader = source.open(p).unwrap();
            while let Some(r) = reader.next_record().unwrap() {
                out.push(r);
            }
        }
        out
    }

    #[test]
    fn produces_exact_count_and_sizes() {
        let source = SyntheticSource::new(SyntheticSourceConfig::new(1024, 1, 1024)).unwrap();
        let records = drain(&source);
        assert_eq!(records.len(), 1024);
        assert!(records.iter().all(|r| r.key.len() == 1 && r.value.len() == 1024));
        assert_eq!(source.estimated_records(), Some(1024));
    }

    #[test]
    fn partitioning_does_not_change_the_stream() {
        let single = SyntheticSource::new(SyntheticSourceConfig::new(101, 4, 16)).unwrap();
        let mut cfg = SyntheticSourceConfig::new(101, 4, 16);
        cfg.force_initial_num_bundles = 7;
        let split = SyntheticSource::new(cfg).unwrap();

        assert_eq!(split.partitions(), 7);
        // partitions are contiguous and read in order here
        assert_eq!(drain(&single), drain(&split));
    }

    #[test]
    fn more_partitions_than_records() {
        let mut cfg = SyntheticSourceConfig::new(3, 1, 1);
        cfg.force_initial_num_bundles = 8;
        let source = SyntheticSource::new(cfg).unwrap();
        assert_eq!(drain(&source).len(), 3);
    }

    #[test]
    fn zero_records_is_empty() {
        let source = SyntheticSource::new(SyntheticSourceConfig::new(0, 1, 8)).unwrap();
        assert!(drain(&source).is_empty());
    }

    #[test]
    fn seed_changes_values() {
        let a = SyntheticSource::new(SyntheticSourceConfig::new(1, 1, 32)).unwrap();
        let mut cfg = SyntheticSourceConfig::new(1, 1, 32);
        cfg.seed = 99;
        let b = SyntheticSource::new(cfg).unwrap();
        assert_ne!(a.record_at(0).value, b.record_at(0).value);
        assert_eq!(a.record_at(0), a.record_at(0));
    }

    #[test]
    fn all_hot_keys_come_from_the_hot_set() {
        let mut cfg = SyntheticSourceConfig::new(500, 8, 4);
        cfg.num_hot_keys = 3;
        cfg.hot_key_fraction = 1.0;
        let source = SyntheticSource::new(cfg).unwrap();
        let keys: HashSet<Vec<u8>> = drain(&source).into_iter().map(|r| r.key).collect();
        assert!(keys.len() <= 3);
    }

    #[test]
    fn hot_key_follows_index_modulo() {
        let mut cfg = SyntheticSourceConfig::new(20, 8, 4);
        cfg.num_hot_keys = 3;
        cfg.hot_key_fraction = 1.0;
        let source = SyntheticSource::new(cfg).unwrap();
        for i in 0..17 {
            assert_eq!(source.record_at(i).key, source.record_at(i + 3).key, "index {i}");
        }
        assert_ne!(source.record_at(0).key, source.record_at(1).key);
        // values stay per record
        assert_ne!(source.record_at(0).value, source.record_at(3).value);
    }

    #[test]
    fn open_rejects_unknown_partition() {
        let source = SyntheticSource::new(SyntheticSourceConfig::new(10, 1, 1)).unwrap();
        assert!(source.open(1).is_err());
    }
}
