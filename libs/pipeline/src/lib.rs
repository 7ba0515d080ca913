pub mod config;
pub mod error;
mod metrics;
mod runner;
mod sink;
mod source;
mod transform;

pub use config::{PipelineOptions, SinkOptions};
pub use error::PipelineError;
pub use metrics::PipelineMetrics;
pub use runner::{Pipeline, PipelineResult};
pub use sink::{WarehouseSink, spawn_sink_task};
pub use source::spawn_source;
pub use transform::{Transform, spawn_transform_task};
