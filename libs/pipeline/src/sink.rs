use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use warehouse_api::{
    CreateDisposition, TableRef, TableRow, TableSchema, WarehouseClient, WarehouseError,
    WriteDisposition,
};

use crate::PipelineError;
use crate::config::SinkOptions;
use crate::metrics::PipelineMetrics;

// ═══════════════════════════════════════════════════════════════
//  WarehouseSink
// ═══════════════════════════════════════════════════════════════

/// Writes rows into one warehouse table, applying create/write
/// dispositions once before the first row.
pub struct WarehouseSink {
    client: Arc<dyn WarehouseClient>,
    table: TableRef,
    schema: TableSchema,
    options: SinkOptions,
}

impl WarehouseSink {
    pub fn new(
        client: Arc<dyn WarehouseClient>,
        table: TableRef,
        schema: TableSchema,
        options: SinkOptions,
    ) -> Self {
        Self { client, table, schema, options }
    }

    /// Bring the destination table into the state the dispositions ask
    /// for. Nothing is written when this fails.
    pub async fn prepare(&self) -> Result<(), WarehouseError> {
        let existing = self
            .client
            .get_table(&self.table)
            .await
            .map_err(|e| e.with_context(format!("look up {}", self.table)))?;

        match existing {
            None => match self.options.create_disposition {
                CreateDisposition::CreateIfNeeded => {
                    self.client
                        .create_table(&self.table, &self.schema)
                        .await
                        .map_err(|e| e.with_context(format!("create {}", self.table)))?;
                    tracing::info!(
                        table = %self.table,
                        warehouse = %self.client.name(),
                        schema = %self.schema.to_json(),
                        "created table"
                    );
                }
                CreateDisposition::CreateNever => {
                    return Err(WarehouseError::not_found(format!(
                        "table {} does not exist and create disposition is {}",
                        self.table, self.options.create_disposition
                    )));
                }
            },
            Some(info) => match self.options.write_disposition {
                WriteDisposition::WriteEmpty if info.num_rows > 0 => {
                    return Err(WarehouseError::conflict(format!(
                        "table {} is not empty ({} rows) and write disposition is {}",
                        self.table, info.num_rows, self.options.write_disposition
                    )));
                }
                WriteDisposition::WriteEmpty | WriteDisposition::WriteAppend => {
                    tracing::info!(table = %self.table, rows = info.num_rows, "writing to existing table");
                }
                WriteDisposition::WriteTruncate => {
                    self.client
                        .truncate_table(&self.table)
                        .await
                        .map_err(|e| e.with_context(format!("truncate {}", self.table)))?;
                    tracing::info!(table = %self.table, removed = info.num_rows, "truncated table");
                }
            },
        }
        Ok(())
    }

    async fn write_batch(&self, rows: &[TableRow]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.client
            .insert_rows(&self.table, rows)
            .await
            .map_err(|e| e.with_context(format!("insert {} rows into {}", rows.len(), self.table)))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sink task — row channel → validate → batch → insert
// ═══════════════════════════════════════════════════════════════

/// Drain `rx` into the sink. The final partial batch is flushed only
/// when upstream closed the channel without cancelling the run.
pub fn spawn_sink_task(
    stage: String,
    sink: Arc<WarehouseSink>,
    mut rx: mpsc::Receiver<TableRow>,
    metrics: Arc<PipelineMetrics>,
    token: CancellationToken,
) -> JoinHandle<Result<(), PipelineError>> {
    tokio::spawn(async move {
        let result = sink_loop(&stage, &sink, &mut rx, &metrics, &token).await;
        if let Err(ref e) = result {
            if !e.is_cancelled() {
                tracing::error!(stage = %stage, error = %e, "sink error");
                token.cancel();
            }
        }
        result
    })
}

async fn sink_loop(
    stage: &str,
    sink: &WarehouseSink,
    rx: &mut mpsc::Receiver<TableRow>,
    metrics: &PipelineMetrics,
    token: &CancellationToken,
) -> Result<(), PipelineError> {
    let batch_size = sink.options.batch_size.max(1);
    let mut batch: Vec<TableRow> = Vec::with_capacity(batch_size);
    let mut batches = 0u64;

    loop {
        tokio::select! {
            row = rx.recv() => {
                match row {
                    Some(row) => {
                        sink.schema
                            .validate_row(&row)
                            .map_err(|e| PipelineError::stage(stage, e))?;
                        batch.push(row);
                        if batch.len() >= batch_size {
                            flush(stage, sink, &batch, token).await?;
                            metrics.rows_written(batch.len());
                            batches += 1;
                            batch.clear();
                        }
                    }
                    None => break,
                }
            }
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
        }
    }

    if token.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    if !batch.is_empty() {
        flush(stage, sink, &batch, token).await?;
        metrics.rows_written(batch.len());
        batches += 1;
    }

    tracing::info!(
        stage = %stage,
        table = %sink.table,
        rows = metrics.rows_written_total(),
        batches,
        "sink finished"
    );
    Ok(())
}

/// Insert one batch, abandoning the request when the run is cancelled.
async fn flush(
    stage: &str,
    sink: &WarehouseSink,
    batch: &[TableRow],
    token: &CancellationToken,
) -> Result<(), PipelineError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PipelineError::Cancelled),
        written = sink.write_batch(batch) => written.map_err(|e| PipelineError::stage(stage, e)),
    }
}
