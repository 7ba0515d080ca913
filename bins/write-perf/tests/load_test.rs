use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use serde_json::json;

use source_synthetic::{SyntheticSource, SyntheticSourceConfig};
use storage_memory::MemoryWarehouse;
use warehouse_api::client::WarehouseFuture;
use warehouse_api::{
    ErrorKind, TableInfo, TableRef, TableRow, TableSchema, WarehouseClient, WarehouseError, WriteDisposition,
};
use write_perf::cmd::format::output_schema;
use write_perf::{Cli, Effective, LoadTest, Outcome, WritePerfError, execute};

const INPUT: &str = r#"{"num_records": 1024, "key_size": 1, "value_size": 1024}"#;

fn config(input: &str) -> Effective {
    Effective {
        output_dataset: Some("perf".into()),
        output_table: Some("bq_write".into()),
        input_options: Some(input.into()),
        ..Effective::default()
    }
}

fn table() -> TableRef {
    TableRef::new("perf", "bq_write").unwrap()
}

fn stage_error_kind(outcome: &Outcome) -> Option<ErrorKind> {
    match outcome {
        Outcome::Failed(WritePerfError::Pipeline(e)) => e.kind(),
        _ => None,
    }
}

#[tokio::test]
async fn skipped_unless_gate_is_exactly_true() {
    // An unparsable config proves the skip path never reads it.
    let path = std::env::temp_dir().join(format!("write-perf-skip-{}.toml", std::process::id()));
    std::fs::write(&path, "this is = = not toml").unwrap();
    let path_str = path.to_string_lossy().to_string();
    let args = Cli::try_parse_from(["write-perf", "--config", &path_str]).unwrap().args;

    for gate in [None, Some("false"), Some("TRUE"), Some("1"), Some("")] {
        let outcome = execute(gate, &args).await;
        assert!(matches!(outcome, Outcome::Skipped(_)), "{gate:?}: {outcome:?}");
        assert_eq!(outcome.exit_code(), 0);
    }

    let outcome = execute(Some("true"), &args).await;
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(outcome, Outcome::Failed(WritePerfError::Config(_))), "{outcome:?}");
    assert_eq!(outcome.exit_code(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writes_every_record_base64_encoded() {
    let wh = Arc::new(MemoryWarehouse::new());
    let mut cfg = config(r#"{"num_records": 1024, "key_size": 1, "value_size": 1024, "force_initial_num_bundles": 3}"#);
    cfg.sink.batch_size = 100;
    let mut lt = LoadTest::new(cfg).with_client(wh.clone());

    lt.set_up().unwrap();
    let metrics = lt.test().await.unwrap();
    assert_eq!(metrics.records_read, 1024);
    assert_eq!(metrics.rows_written, 1024);
    assert_eq!(metrics.bytes_read, 1024 * 1025);

    let rows = wh.rows(&table()).await.unwrap();
    assert_eq!(rows.len(), 1024);
    assert_eq!(wh.schema(&table()).await.unwrap(), output_schema().unwrap());

    // Partitions interleave, so compare as sets of encoded values.
    let mut cfg = SyntheticSourceConfig::new(1024, 1, 1024);
    cfg.force_initial_num_bundles = 3;
    let source = SyntheticSource::new(cfg).unwrap();
    let mut expected: Vec<String> = (0..1024).map(|i| STANDARD.encode(source.record_at(i).value)).collect();
    let mut got: Vec<String> = rows
        .iter()
        .map(|r| r.get("data").and_then(|v| v.as_str()).unwrap().to_string())
        .collect();
    expected.sort();
    got.sort();
    assert_eq!(got, expected);

    lt.tear_down().await.unwrap();
    assert!(wh.get_table(&table()).await.unwrap().is_none());
}

#[tokio::test]
async fn table_is_gone_after_a_pass() {
    let wh = Arc::new(MemoryWarehouse::new());
    let outcome = LoadTest::new(config(INPUT)).with_client(wh.clone()).run().await;

    match outcome {
        Outcome::Passed(m) => assert_eq!(m.rows_written, 1024),
        other => panic!("expected pass, got {other:?}"),
    }
    assert!(wh.get_table(&table()).await.unwrap().is_none());
}

#[tokio::test]
async fn non_empty_table_fails_and_is_still_deleted() {
    let wh = Arc::new(MemoryWarehouse::new());
    wh.create_table(&table(), &output_schema().unwrap()).await.unwrap();
    let row = TableRow::try_from(json!({ "data": "AA==" })).unwrap();
    wh.insert_rows(&table(), &[row]).await.unwrap();

    let outcome = LoadTest::new(config(INPUT)).with_client(wh.clone()).run().await;

    assert_eq!(stage_error_kind(&outcome), Some(ErrorKind::Conflict), "{outcome:?}");
    assert_eq!(outcome.exit_code(), 1);
    // the pre-existing row was never appended to
    assert_eq!(wh.insert_calls(), 1);
    assert!(wh.get_table(&table()).await.unwrap().is_none());
}

#[tokio::test]
async fn existing_empty_table_is_accepted() {
    let wh = Arc::new(MemoryWarehouse::new());
    wh.create_table(&table(), &output_schema().unwrap()).await.unwrap();

    let outcome = LoadTest::new(config(INPUT)).with_client(wh.clone()).run().await;
    assert!(matches!(outcome, Outcome::Passed(_)), "{outcome:?}");
}

#[tokio::test]
async fn truncate_disposition_overwrites_existing_rows() {
    let wh = Arc::new(MemoryWarehouse::new());
    wh.create_table(&table(), &output_schema().unwrap()).await.unwrap();
    let row = TableRow::try_from(json!({ "data": "AA==" })).unwrap();
    wh.insert_rows(&table(), &[row]).await.unwrap();

    let mut cfg = config(r#"{"num_records": 10, "key_size": 1, "value_size": 8}"#);
    cfg.sink.write_disposition = WriteDisposition::WriteTruncate;
    let mut lt = LoadTest::new(cfg).with_client(wh.clone());
    lt.set_up().unwrap();
    lt.test().await.unwrap();
    assert_eq!(wh.rows(&table()).await.unwrap().len(), 10);
    lt.tear_down().await.unwrap();
}

#[tokio::test]
async fn missing_dataset_or_table_fails_before_the_pipeline() {
    let wh = Arc::new(MemoryWarehouse::new());

    let mut cfg = config(INPUT);
    cfg.output_dataset = None;
    let outcome = LoadTest::new(cfg).with_client(wh.clone()).run().await;
    assert!(matches!(outcome, Outcome::Failed(WritePerfError::ConfigMissing("output_dataset"))), "{outcome:?}");

    let mut cfg = config(INPUT);
    cfg.output_table = None;
    let outcome = LoadTest::new(cfg).with_client(wh.clone()).run().await;
    assert!(matches!(outcome, Outcome::Failed(WritePerfError::ConfigMissing("output_table"))), "{outcome:?}");

    assert_eq!(wh.insert_calls(), 0);
    assert!(wh.get_table(&table()).await.unwrap().is_none());
}

#[tokio::test]
async fn project_prefix_on_dataset_is_accepted() {
    let wh = Arc::new(MemoryWarehouse::new());
    let mut cfg = config(r#"{"num_records": 4, "key_size": 1, "value_size": 4}"#);
    cfg.output_dataset = Some("my-project:perf".into());
    let outcome = LoadTest::new(cfg).with_client(wh.clone()).run().await;
    assert!(matches!(outcome, Outcome::Passed(_)), "{outcome:?}");
}

#[tokio::test]
async fn dotted_table_name_fails_set_up() {
    let mut cfg = config(INPUT);
    cfg.output_table = Some("bq.write".into());
    let mut lt = LoadTest::new(cfg).with_client(Arc::new(MemoryWarehouse::new()));
    match lt.set_up() {
        Err(WritePerfError::Warehouse(e)) => assert_eq!(e.kind(), ErrorKind::Config),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_required_input_option_fails_set_up() {
    let mut lt = LoadTest::new(config(r#"{"num_records": 10, "value_size": 8}"#))
        .with_client(Arc::new(MemoryWarehouse::new()));
    match lt.set_up() {
        Err(WritePerfError::Warehouse(e)) => assert_eq!(e.kind(), ErrorKind::Config),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_before_set_up_is_rejected() {
    let lt = LoadTest::new(config(INPUT));
    assert!(matches!(lt.test().await, Err(WritePerfError::NotSetUp)));
    assert!(matches!(lt.tear_down().await, Err(WritePerfError::NotSetUp)));
}

#[tokio::test]
async fn failed_insert_fails_the_run_and_still_tears_down() {
    // 1024 rows do not fit into a 100-row warehouse.
    let wh = Arc::new(MemoryWarehouse::from_config_json(r#"{"max_rows": 100}"#).unwrap());
    let outcome = LoadTest::new(config(INPUT)).with_client(wh.clone()).run().await;

    assert_eq!(stage_error_kind(&outcome), Some(ErrorKind::Io), "{outcome:?}");
    assert!(wh.get_table(&table()).await.unwrap().is_none());
}

#[tokio::test]
async fn teardown_failure_is_reported() {
    // create_never on a missing table: the run fails and so does the delete.
    let wh = Arc::new(MemoryWarehouse::new());
    let mut cfg = config(INPUT);
    cfg.sink.create_disposition = warehouse_api::CreateDisposition::CreateNever;
    let outcome = LoadTest::new(cfg).with_client(wh).run().await;

    match outcome {
        Outcome::Failed(WritePerfError::TestAndTeardown { test, teardown }) => {
            assert!(matches!(*test, WritePerfError::Pipeline(ref e) if e.kind() == Some(ErrorKind::NotFound)));
            assert!(matches!(*teardown, WritePerfError::Teardown { ref source, .. } if source.kind() == ErrorKind::NotFound));
        }
        other => panic!("expected test and teardown failure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_cancels_the_run() {
    let wh = Arc::new(MemoryWarehouse::new());
    let mut cfg = config(r#"{"num_records": 50000000, "key_size": 1, "value_size": 64}"#);
    cfg.timeout_ms = Some(1);
    let outcome = LoadTest::new(cfg).with_client(wh.clone()).run().await;

    assert!(matches!(outcome, Outcome::Failed(WritePerfError::Timeout { ms: 1 })), "{outcome:?}");
    assert!(wh.get_table(&table()).await.unwrap().is_none());
}

/// Table lookups hang forever; everything else goes to memory.
struct HangingLookup(MemoryWarehouse);

impl WarehouseClient for HangingLookup {
    fn name(&self) -> &str {
        "hanging"
    }
    fn get_table<'a>(&'a self, _table: &'a TableRef) -> WarehouseFuture<'a, Option<TableInfo>> {
        Box::pin(std::future::pending::<Result<Option<TableInfo>, WarehouseError>>())
    }
    fn create_table<'a>(&'a self, table: &'a TableRef, schema: &'a TableSchema) -> WarehouseFuture<'a, ()> {
        self.0.create_table(table, schema)
    }
    fn insert_rows<'a>(&'a self, table: &'a TableRef, rows: &'a [TableRow]) -> WarehouseFuture<'a, ()> {
        self.0.insert_rows(table, rows)
    }
    fn truncate_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()> {
        self.0.truncate_table(table)
    }
    fn delete_table<'a>(&'a self, table: &'a TableRef) -> WarehouseFuture<'a, ()> {
        self.0.delete_table(table)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_holds_when_the_warehouse_hangs() {
    let mut cfg = config(INPUT);
    cfg.timeout_ms = Some(50);
    let run = LoadTest::new(cfg).with_client(Arc::new(HangingLookup(MemoryWarehouse::new()))).run();

    let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), run)
        .await
        .expect("run must return shortly after timeout_ms");

    // The table was never created, so the teardown delete reports it missing.
    match outcome {
        Outcome::Failed(WritePerfError::TestAndTeardown { test, teardown }) => {
            assert!(matches!(*test, WritePerfError::Timeout { ms: 50 }));
            assert!(matches!(*teardown, WritePerfError::Teardown { ref source, .. } if source.kind() == ErrorKind::NotFound));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn metrics_are_written_as_json() {
    let path = std::env::temp_dir().join(format!("write-perf-metrics-{}.json", std::process::id()));
    let mut cfg = config(r#"{"num_records": 64, "key_size": 2, "value_size": 16}"#);
    cfg.metrics_output = Some(path.to_string_lossy().to_string());

    let outcome = LoadTest::new(cfg).with_client(Arc::new(MemoryWarehouse::new())).run().await;
    assert!(matches!(outcome, Outcome::Passed(_)), "{outcome:?}");

    let written: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(written["records_read"], 64);
    assert_eq!(written["rows_written"], 64);
    assert_eq!(written["bytes_read"], 64 * 18);
}
