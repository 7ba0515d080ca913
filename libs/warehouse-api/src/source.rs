use crate::error::WarehouseError;
use crate::record::Record;

/// Bounded record source, split into partitions that can be read
/// independently (one blocking reader per partition).
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;

    /// Number of partitions. Always at least 1.
    fn partitions(&self) -> usize;

    /// Total number of records over all partitions, when known up front.
    fn estimated_records(&self) -> Option<u64>;

    /// Open a reader over one partition.
    fn open(&self, partition: usize) -> Result<Box<dyn RecordReader>, WarehouseError>;
}

/// Sequential reader over one partition. `Ok(None)` = exhausted.
pub trait RecordReader: Send {
    fn next_record(&mut self) -> Result<Option<Record>, WarehouseError>;
}
