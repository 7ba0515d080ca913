use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use warehouse_api::{Record, RecordSource, TableRow};

use crate::config::PipelineOptions;
use crate::metrics::PipelineMetrics;
use crate::sink::{WarehouseSink, spawn_sink_task};
use crate::source::spawn_source;
use crate::transform::{Transform, spawn_transform_task};
use crate::PipelineError;

/// Totals of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub records_read: u64,
    pub bytes_read: u64,
    pub rows_written: u64,
    pub elapsed: Duration,
}

/// Linear read → map → write pipeline.
///
/// ```ignore
/// let result = Pipeline::new("write-perf", PipelineOptions::default())
///     .read("ProduceRows", source)
///     .map("Format", format_record)
///     .write("WriteToWarehouse", sink)
///     .run()
///     .await?;
/// ```
pub struct Pipeline {
    name: String,
    options: PipelineOptions,
    token: CancellationToken,
    source: Option<(String, Arc<dyn RecordSource>)>,
    transform: Option<(String, Arc<dyn Transform>)>,
    sink: Option<(String, WarehouseSink)>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, options: PipelineOptions) -> Self {
        Self {
            name: name.into(),
            options,
            token: CancellationToken::new(),
            source: None,
            transform: None,
            sink: None,
        }
    }

    pub fn read(mut self, label: &str, source: Arc<dyn RecordSource>) -> Self {
        self.source = Some((label.to_string(), source));
        self
    }

    pub fn map(mut self, label: &str, transform: impl Transform + 'static) -> Self {
        self.transform = Some((label.to_string(), Arc::new(transform)));
        self
    }

    pub fn write(mut self, label: &str, sink: WarehouseSink) -> Self {
        self.sink = Some((label.to_string(), sink));
        self
    }

    /// Token that aborts the run when cancelled (e.g. on timeout).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run to completion. Blocks until the sink flushed its last batch or
    /// any stage failed; the first stage error is returned.
    pub async fn run(self) -> Result<PipelineResult, PipelineError> {
        let Pipeline { name, options, token, source, transform, sink } = self;
        let (source_label, source) = source.ok_or(PipelineError::Incomplete { pipeline: name.clone(), stage: "read" })?;
        let (map_label, transform) =
            transform.ok_or(PipelineError::Incomplete { pipeline: name.clone(), stage: "map" })?;
        let (sink_label, sink) = sink.ok_or(PipelineError::Incomplete { pipeline: name.clone(), stage: "write" })?;

        let start = Instant::now();
        tracing::info!(pipeline = %name, read = %source_label, map = %map_label, write = %sink_label, "pipeline starting");

        // Dispositions are checked before any record is produced.
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
            prepared = sink.prepare() => prepared.map_err(|e| PipelineError::stage(&sink_label, e))?,
        }

        let buffer = options.buffer.max(1);
        let metrics = Arc::new(PipelineMetrics::default());
        let (record_tx, record_rx) = mpsc::channel::<Record>(buffer);
        let (row_tx, row_rx) = mpsc::channel::<TableRow>(buffer);

        let stages: Vec<(String, JoinHandle<Result<(), PipelineError>>)> = vec![
            (
                source_label.clone(),
                spawn_source(source_label, source, record_tx, metrics.clone(), token.clone()),
            ),
            (
                map_label.clone(),
                spawn_transform_task(map_label, transform, record_rx, row_tx, token.clone()),
            ),
            (
                sink_label.clone(),
                spawn_sink_task(sink_label, Arc::new(sink), row_rx, metrics.clone(), token.clone()),
            ),
        ];

        let mut first_err: Option<PipelineError> = None;
        for (label, handle) in stages {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    token.cancel();
                    Err(PipelineError::Join { stage: label, detail: e.to_string() })
                }
            };
            if let Err(e) = outcome {
                match first_err {
                    Some(ref prev) if !prev.is_cancelled() => {}
                    _ => first_err = Some(e),
                }
            }
        }

        if let Some(e) = first_err {
            tracing::error!(pipeline = %name, error = %e, "pipeline failed");
            return Err(e);
        }

        let result = PipelineResult {
            records_read: metrics.records_read_total(),
            bytes_read: metrics.bytes_read_total(),
            rows_written: metrics.rows_written_total(),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            pipeline = %name,
            records = result.records_read,
            rows = result.rows_written,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "pipeline finished"
        );
        Ok(result)
    }
}
