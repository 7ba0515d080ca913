use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the stages of one run.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    records_read: AtomicU64,
    bytes_read: AtomicU64,
    rows_written: AtomicU64,
}

impl PipelineMetrics {
    pub fn record_read(&self, bytes: usize) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn rows_written(&self, rows: usize) {
        self.rows_written.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn records_read_total(&self) -> u64 {
        self.records_read.load(Ordering::Relaxed)
    }

    pub fn bytes_read_total(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn rows_written_total(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }
}
