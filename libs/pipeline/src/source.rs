use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use warehouse_api::{Record, RecordSource};

use crate::PipelineError;
use crate::metrics::PipelineMetrics;

// ═══════════════════════════════════════════════════════════════
//  Source task — partitions → blocking readers → record channel
// ═══════════════════════════════════════════════════════════════

/// Read every partition of `source` on its own blocking thread and push
/// records into `tx`.
///
/// The first reader error cancels `token` before the reader's sender is
/// dropped, so downstream stages never mistake a failed read for the
/// end of input.
pub fn spawn_source(
    stage: String,
    source: Arc<dyn RecordSource>,
    tx: mpsc::Sender<Record>,
    metrics: Arc<PipelineMetrics>,
    token: CancellationToken,
) -> JoinHandle<Result<(), PipelineError>> {
    tokio::spawn(async move {
        let partitions = source.partitions().max(1);
        tracing::info!(
            stage = %stage,
            source = %source.name(),
            partitions,
            estimated = ?source.estimated_records(),
            "source starting"
        );

        let mut readers = Vec::with_capacity(partitions);
        for partition in 0..partitions {
            let source = source.clone();
            let tx = tx.clone();
            let metrics = metrics.clone();
            let token = token.clone();
            let stage = stage.clone();
            readers.push(tokio::task::spawn_blocking(move || {
                let result = read_partition(&stage, &*source, partition, &tx, &metrics, &token);
                if let Err(ref e) = result {
                    if !e.is_cancelled() {
                        tracing::error!(stage = %stage, partition, error = %e, "read error");
                        token.cancel();
                    }
                }
                drop(tx);
                result
            }));
        }
        drop(tx);

        let mut first_err: Option<PipelineError> = None;
        for reader in readers {
            let outcome = match reader.await {
                Ok(result) => result,
                Err(e) => {
                    token.cancel();
                    Err(PipelineError::Join { stage: stage.clone(), detail: e.to_string() })
                }
            };
            if let Err(e) = outcome {
                // Prefer the root cause over the cancellations it triggered.
                match first_err {
                    Some(ref prev) if !prev.is_cancelled() => {}
                    _ => first_err = Some(e),
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                tracing::info!(stage = %stage, records = metrics.records_read_total(), "source finished");
                Ok(())
            }
        }
    })
}

/// Blocking read of one partition.
fn read_partition(
    stage: &str,
    source: &dyn RecordSource,
    partition: usize,
    tx: &mpsc::Sender<Record>,
    metrics: &PipelineMetrics,
    token: &CancellationToken,
) -> Result<(), PipelineError> {
    let mut reader = source
        .open(partition)
        .map_err(|e| PipelineError::stage(stage, e.with_context(format!("open partition {partition}"))))?;

    let mut read = 0u64;
    loop {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        match reader.next_record() {
            Ok(Some(record)) => {
                metrics.record_read(record.size());
                // Closed channel: downstream already stopped.
                if tx.blocking_send(record).is_err() {
                    return Err(PipelineError::Cancelled);
                }
                read += 1;
            }
            Ok(None) => break,
            Err(e) => return Err(PipelineError::stage(stage, e)),
        }
    }

    tracing::debug!(stage = %stage, partition, records = read, "partition exhausted");
    Ok(())
}
