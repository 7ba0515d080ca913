use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use warehouse_api::{Record, TableRow, WarehouseError};

use crate::PipelineError;

/// Element-wise transform from a source record to a table row.
///
/// Any error fails the whole run.
pub trait Transform: Send + Sync {
    fn apply(&self, record: Record) -> Result<TableRow, WarehouseError>;
}

impl<F> Transform for F
where
    F: Fn(Record) -> Result<TableRow, WarehouseError> + Send + Sync,
{
    fn apply(&self, record: Record) -> Result<TableRow, WarehouseError> {
        self(record)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Transform task — record channel → apply() → row channel
// ═══════════════════════════════════════════════════════════════

pub fn spawn_transform_task(
    stage: String,
    transform: Arc<dyn Transform>,
    mut rx: mpsc::Receiver<Record>,
    tx: mpsc::Sender<TableRow>,
    token: CancellationToken,
) -> JoinHandle<Result<(), PipelineError>> {
    tokio::spawn(async move {
        let result = transform_loop(&stage, &*transform, &mut rx, &tx, &token).await;
        if let Err(ref e) = result {
            if !e.is_cancelled() {
                tracing::error!(stage = %stage, error = %e, "transform error");
                token.cancel();
            }
        }
        // tx is dropped only after the token has been cancelled on error.
        drop(tx);
        result
    })
}

async fn transform_loop(
    stage: &str,
    transform: &dyn Transform,
    rx: &mut mpsc::Receiver<Record>,
    tx: &mpsc::Sender<TableRow>,
    token: &CancellationToken,
) -> Result<(), PipelineError> {
    let mut mapped = 0u64;
    loop {
        tokio::select! {
            record = rx.recv() => {
                match record {
                    Some(record) => {
                        let row = transform
                            .apply(record)
                            .map_err(|e| PipelineError::stage(stage, e))?;
                        if tx.send(row).await.is_err() {
                            return Err(PipelineError::Cancelled);
                        }
                        mapped += 1;
                    }
                    None => break,
                }
            }
            _ = token.cancelled() => return Err(PipelineError::Cancelled),
        }
    }

    // Upstream cancels before closing its channel on failure.
    if token.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    tracing::info!(stage = %stage, rows = mapped, "transform finished");
    Ok(())
}
