#![cfg(feature = "failpoints")]

mod common;

use fail::FailScenario;
use lakeflow::alerts::AlertStatus;
use lakeflow::error::ErrorKind;
use lakeflow::pipeline::CycleOutcome;
use lakeflow::store::watermark::WatermarkStore;
use lakeflow::types::{Cursor, TableName};
use telemetry::tracing::init_test_tracing;

use crate::common::{create_pipeline, epoch_floor, january, order_row, orders_config, orders_schema};

fn orders() -> TableName {
    TableName::new("sales", "orders")
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_batch_write_leaves_watermark_unmoved() {
    init_test_tracing();

    let scenario = FailScenario::setup();
    fail::cfg(
        "write_batch.before_persist",
        "return(batch_write_failed)",
    )
    .unwrap();

    let harness = create_pipeline(vec![orders_config()]);
    harness.source.add_table(orders_schema()).await;
    harness
        .source
        .push_rows(&orders(), vec![order_row(1, "placed", january(1))])
        .await;

    let reports = harness.pipeline.run_cycle().await.unwrap();

    match &reports[0].outcome {
        CycleOutcome::Failed { error } => {
            assert_eq!(error.kind(), ErrorKind::BatchWriteFailed);
        }
        other => panic!("expected a failed outcome, got {other:?}"),
    }

    // The batch never became durable, so the cursor must not have moved and
    // no artifact may exist.
    assert_eq!(
        harness.watermarks.get(&orders()).await.unwrap(),
        Cursor::Timestamp(epoch_floor())
    );
    assert!(harness.batches.artifact_names().await.is_empty());

    let alerts = harness.alerts.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].status, AlertStatus::Failed);

    // With the fault removed, the retry re-reads the same rows and completes.
    fail::cfg("write_batch.before_persist", "off").unwrap();

    let reports = harness.pipeline.run_cycle().await.unwrap();
    match &reports[0].outcome {
        CycleOutcome::Loaded {
            rows, watermark, ..
        } => {
            assert_eq!(*rows, 1);
            assert_eq!(*watermark, Cursor::Timestamp(january(1)));
        }
        other => panic!("expected a loaded outcome, got {other:?}"),
    }

    scenario.teardown();
}
