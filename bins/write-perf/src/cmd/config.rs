use clap::{Args, Parser};
use serde::Deserialize;

use pipeline::{PipelineOptions, SinkOptions};
use warehouse_api::{CreateDisposition, WriteDisposition};

use super::error::WritePerfError;

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub project: Option<String>,
    pub output_dataset: Option<String>,
    pub output_table: Option<String>,
    /// Synthetic source options, same keys as `--input-options`.
    pub input_options: Option<toml::Value>,
    pub batch_size: Option<usize>,
    pub buffer: Option<usize>,
    pub create_disposition: Option<CreateDisposition>,
    pub write_disposition: Option<WriteDisposition>,
    pub timeout_ms: Option<u64>,
    pub metrics_output: Option<String>,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    /// Backend: "clickhouse" or "memory".
    #[serde(default = "default_storage")]
    pub storage: String,
    pub storage_config: Option<toml::Value>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            storage_config: None,
        }
    }
}

fn default_storage() -> String {
    "clickhouse".into()
}

pub fn load_config(path: &str) -> Result<Config, WritePerfError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| WritePerfError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| WritePerfError::Config(format!("bad config {path}: {e}")))
}

/// TOML sub-table → JSON string for backend/source constructors
/// (`None` → `"{}"`).
pub fn config_json_or_empty(val: &Option<toml::Value>) -> Result<String, WritePerfError> {
    match val {
        Some(v) => serde_json::to_string(v).map_err(|e| WritePerfError::Config(format!("serialize config: {e}"))),
        None => Ok("{}".to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "write-perf", about = "Warehouse write load test")]
pub struct Cli {
    #[command(flatten)]
    pub args: RunArgs,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Path to the TOML config
    #[arg(long, default_value = "write-perf.toml", env = "WRITE_PERF_CONFIG")]
    pub config: String,

    /// Warehouse project the output table belongs to
    #[arg(long)]
    pub project: Option<String>,

    /// Dataset (database) of the output table
    #[arg(long)]
    pub output_dataset: Option<String>,

    /// Output table, created by the run and deleted afterwards
    #[arg(long)]
    pub output_table: Option<String>,

    /// Synthetic source options as JSON,
    /// e.g. '{"num_records": 1024, "key_size": 1, "value_size": 1024}'
    #[arg(long)]
    pub input_options: Option<String>,

    /// Rows per insert request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// create_if_needed | create_never
    #[arg(long)]
    pub create_disposition: Option<CreateDisposition>,

    /// write_empty | write_append | write_truncate
    #[arg(long)]
    pub write_disposition: Option<WriteDisposition>,

    /// Cancel the run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Write run metrics as JSON to this file
    #[arg(long)]
    pub metrics_output: Option<String>,

    /// Warehouse backend, overrides [warehouse] storage
    #[arg(long)]
    pub storage: Option<String>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Configuration after merging: config file < CLI/env.
///
/// Dataset, table and input options stay optional here; `LoadTest::set_up`
/// is where their absence becomes an error.
#[derive(Debug, Clone, Default)]
pub struct Effective {
    pub project: Option<String>,
    pub output_dataset: Option<String>,
    pub output_table: Option<String>,
    /// JSON form of the synthetic source options.
    pub input_options: Option<String>,
    pub pipeline: PipelineOptions,
    pub sink: SinkOptions,
    pub timeout_ms: Option<u64>,
    pub metrics_output: Option<String>,
    pub warehouse: WarehouseConfig,
}

impl Effective {
    pub fn new(args: &RunArgs) -> Result<Self, WritePerfError> {
        let cfg = match load_config(&args.config) {
            Ok(c) => c,
            Err(e) => {
                if std::path::Path::new(&args.config).exists() {
                    return Err(e);
                }
                Config::default()
            }
        };

        let input_options = match &args.input_options {
            Some(json) => Some(json.clone()),
            None if cfg.input_options.is_some() => Some(config_json_or_empty(&cfg.input_options)?),
            None => None,
        };

        let defaults = SinkOptions::default();
        let sink = SinkOptions {
            batch_size: args.batch_size.or(cfg.batch_size).unwrap_or(defaults.batch_size),
            create_disposition: args
                .create_disposition
                .or(cfg.create_disposition)
                .unwrap_or(defaults.create_disposition),
            write_disposition: args
                .write_disposition
                .or(cfg.write_disposition)
                .unwrap_or(defaults.write_disposition),
        };
        if sink.batch_size == 0 {
            return Err(WritePerfError::Config("batch_size must be at least 1".into()));
        }

        let mut pipeline = PipelineOptions::default();
        if let Some(buffer) = cfg.buffer {
            pipeline.buffer = buffer;
        }

        let mut warehouse = cfg.warehouse;
        if let Some(ref storage) = args.storage {
            warehouse.storage = storage.clone();
        }

        Ok(Self {
            project: args.project.clone().or(cfg.project),
            output_dataset: args.output_dataset.clone().or(cfg.output_dataset),
            output_table: args.output_table.clone().or(cfg.output_table),
            input_options,
            pipeline,
            sink,
            timeout_ms: args.timeout_ms.or(cfg.timeout_ms),
            metrics_output: args.metrics_output.clone().or(cfg.metrics_output),
            warehouse,
        })
    }
}
