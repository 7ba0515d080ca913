use warehouse_api::{ErrorKind, WarehouseError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline '{pipeline}' has no {stage} stage")]
    Incomplete { pipeline: String, stage: &'static str },

    #[error("{stage}: {source}")]
    Stage { stage: String, source: WarehouseError },

    #[error("{stage}: task failed: {detail}")]
    Join { stage: String, detail: String },

    #[error("pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn stage(stage: &str, source: WarehouseError) -> Self {
        PipelineError::Stage { stage: stage.to_string(), source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// Kind of the underlying warehouse error, if the failure came from one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineError::Stage { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}
