use serde::Deserialize;

use warehouse_api::{CreateDisposition, WriteDisposition};

// ═══════════════════════════════════════════════════════════════
//  Pipeline Options
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineOptions {
    /// Capacity of each inter-stage channel (back-pressure bound).
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { buffer: default_buffer() }
    }
}

fn default_buffer() -> usize {
    8192
}

// ═══════════════════════════════════════════════════════════════
//  Sink Options
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct SinkOptions {
    /// Rows per insert request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub create_disposition: CreateDisposition,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
        }
    }
}

fn default_batch_size() -> usize {
    500
}
