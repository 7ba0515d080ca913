use warehouse_api::{TableRef, WarehouseError};

#[derive(Debug, thiserror::Error)]
pub enum WritePerfError {
    #[error("missing required configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Warehouse(#[from] WarehouseError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("run exceeded timeout of {ms} ms")]
    Timeout { ms: u64 },

    #[error("delete table {table}: {source}")]
    Teardown { table: TableRef, source: WarehouseError },

    #[error("{test}; teardown also failed: {teardown}")]
    TestAndTeardown {
        test: Box<WritePerfError>,
        teardown: Box<WritePerfError>,
    },

    #[error("test() called before set_up()")]
    NotSetUp,

    #[error("write metrics {path}: {source}")]
    Metrics { path: String, source: std::io::Error },
}
