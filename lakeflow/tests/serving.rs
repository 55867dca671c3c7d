mod common;

use std::collections::HashMap;

use lakeflow::error::ErrorKind;
use lakeflow::facts::{
    DimensionBinding, DimensionLookup, FactAppender, FactTable, KeyResolution,
};
use lakeflow::merge::DimensionTable;
use lakeflow::types::{BusinessKey, Cell, Cursor, StagingRecord, TableName};
use telemetry::tracing::init_test_tracing;

use crate::common::{
    create_pipeline, customer_row, customers_config, customers_schema, event_row, events_config,
    events_schema, january,
};

fn customers() -> TableName {
    TableName::new("crm", "customers")
}

fn events() -> TableName {
    TableName::new("sales", "events")
}

fn key(id: i64) -> BusinessKey {
    BusinessKey::new(vec![Cell::I64(id)])
}

fn events_fact_table() -> FactTable {
    FactTable::new(
        events_schema(),
        &["event_id".to_string()],
        vec![DimensionBinding {
            dimension: customers(),
            key_columns: vec!["customer_id".to_string()],
            resolution: KeyResolution::Current,
        }],
        Some("event_time"),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn attribute_change_versions_the_dimension() {
    init_test_tracing();

    let harness = create_pipeline(vec![customers_config()]);
    harness.source.add_table(customers_schema()).await;

    let mut dimension =
        DimensionTable::for_table(&customers_config(), customers_schema()).unwrap();

    // First batch: key 42 arrives with name "A".
    harness
        .source
        .push_rows(&customers(), vec![customer_row(42, "A", january(1))])
        .await;
    harness.pipeline.run_cycle().await.unwrap();
    harness.pipeline.apply_dimension(&mut dimension).await.unwrap();

    let first = dimension.current_record(&key(42)).unwrap().clone();
    assert!(first.is_current);
    assert_eq!(first.effective_to, None);

    // Second batch: the name changes to "B".
    harness
        .source
        .push_rows(&customers(), vec![customer_row(42, "B", january(2))])
        .await;
    harness.pipeline.run_cycle().await.unwrap();
    let stats = harness.pipeline.apply_dimension(&mut dimension).await.unwrap();

    assert_eq!(stats.versions_closed, 1);
    assert_eq!(stats.inserts, 1);

    let versions = dimension.versions(&key(42));
    assert_eq!(versions.len(), 2);

    // The old version is closed exactly where the new one begins.
    assert!(!versions[0].is_current);
    assert_eq!(versions[0].effective_to, Some(versions[1].effective_from));
    assert!(versions[1].is_current);
    assert_eq!(versions[1].effective_to, None);
    assert_eq!(versions[1].attributes.values()[1], Cell::String("B".into()));
    assert_ne!(versions[0].surrogate_key, versions[1].surrogate_key);
}

#[tokio::test(flavor = "multi_thread")]
async fn re_applying_landed_batches_creates_no_spurious_versions() {
    init_test_tracing();

    let harness = create_pipeline(vec![customers_config()]);
    harness.source.add_table(customers_schema()).await;

    let mut dimension =
        DimensionTable::for_table(&customers_config(), customers_schema()).unwrap();

    harness
        .source
        .push_rows(&customers(), vec![customer_row(42, "B", january(2))])
        .await;
    harness.pipeline.run_cycle().await.unwrap();
    harness.pipeline.apply_dimension(&mut dimension).await.unwrap();

    // Re-feed the same landed batches, twice.
    for _ in 0..2 {
        let stats = harness.pipeline.apply_dimension(&mut dimension).await.unwrap();
        assert_eq!(stats.inserts, 0);
        assert_eq!(stats.versions_closed, 0);
        assert_eq!(stats.unchanged, 1);
    }

    assert_eq!(dimension.versions(&key(42)).len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn fact_rows_resolve_current_dimension_keys() {
    init_test_tracing();

    let harness = create_pipeline(vec![customers_config(), events_config()]);
    harness.source.add_table(customers_schema()).await;
    harness.source.add_table(events_schema()).await;

    harness
        .source
        .push_rows(&customers(), vec![customer_row(42, "A", january(1))])
        .await;
    harness
        .source
        .push_rows(
            &events(),
            vec![event_row(1, 42, 99.5, january(1), january(1))],
        )
        .await;
    harness.pipeline.run_cycle().await.unwrap();

    let mut dimension =
        DimensionTable::for_table(&customers_config(), customers_schema()).unwrap();
    harness.pipeline.apply_dimension(&mut dimension).await.unwrap();
    let expected_key = dimension.current_surrogate_key(&key(42)).unwrap();

    let mut dimensions = HashMap::new();
    dimensions.insert(customers(), dimension);

    let mut facts = events_fact_table();
    let report = harness
        .pipeline
        .apply_facts(&mut facts, &dimensions)
        .await
        .unwrap();

    assert_eq!(report.appended, 1);
    assert!(report.rejected.is_empty());
    assert_eq!(facts.rows()[0].dimension_keys, vec![expected_key]);

    // Re-feeding the same landed batch is a safe no-op.
    let report = harness
        .pipeline
        .apply_facts(&mut facts, &dimensions)
        .await
        .unwrap();
    assert_eq!(report.appended, 0);
    assert_eq!(report.duplicates, 1);
    assert_eq!(facts.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unresolved_references_exclude_only_the_affected_rows() {
    init_test_tracing();

    let harness = create_pipeline(vec![customers_config(), events_config()]);
    harness.source.add_table(customers_schema()).await;
    harness.source.add_table(events_schema()).await;

    harness
        .source
        .push_rows(&customers(), vec![customer_row(42, "A", january(1))])
        .await;
    harness
        .source
        .push_rows(
            &events(),
            vec![
                event_row(1, 42, 10.0, january(1), january(1)),
                // Customer 99 does not exist in the dimension.
                event_row(2, 99, 20.0, january(1), january(1)),
            ],
        )
        .await;
    harness.pipeline.run_cycle().await.unwrap();

    let mut dimension =
        DimensionTable::for_table(&customers_config(), customers_schema()).unwrap();
    harness.pipeline.apply_dimension(&mut dimension).await.unwrap();

    let mut dimensions = HashMap::new();
    dimensions.insert(customers(), dimension);

    let mut facts = events_fact_table();
    let report = harness
        .pipeline
        .apply_facts(&mut facts, &dimensions)
        .await
        .unwrap();

    assert_eq!(report.appended, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(
        report.rejected[0].error.kind(),
        ErrorKind::UnresolvedReference
    );
    assert_eq!(report.rejected[0].record.key, key(2));

    // The appended set never contains the rejected row.
    assert_eq!(facts.len(), 1);
    assert_eq!(facts.rows()[0].key, key(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn event_time_resolution_picks_the_version_effective_at_event_time() {
    init_test_tracing();

    // Build a two-version dimension directly.
    let mut dimension =
        DimensionTable::for_table(&customers_config(), customers_schema()).unwrap();
    let merger = lakeflow::merge::ScdMerger::new();

    let staged = |name: &str, day: u32| StagingRecord {
        key: key(42),
        row: customer_row(42, name, january(day)),
        extracted_at: january(day),
        cursor: Cursor::Timestamp(january(day)),
    };

    merger
        .merge(
            &mut dimension,
            &[staged("A", 1)],
            config::shared::ScdMode::Type2,
        )
        .unwrap();
    merger
        .merge(
            &mut dimension,
            &[staged("B", 5)],
            config::shared::ScdMode::Type2,
        )
        .unwrap();

    let versions = dimension.versions(&key(42));
    let historical_key = versions[0].surrogate_key;
    let current_key = versions[1].surrogate_key;

    let mut dimensions = HashMap::new();
    dimensions.insert(customers(), dimension);

    let mut facts = FactTable::new(
        events_schema(),
        &["event_id".to_string()],
        vec![DimensionBinding {
            dimension: customers(),
            key_columns: vec!["customer_id".to_string()],
            resolution: KeyResolution::AtEventTime,
        }],
        Some("event_time"),
    )
    .unwrap();

    // One event before the version change, one after.
    let staging = vec![
        StagingRecord {
            key: key(1),
            row: event_row(1, 42, 10.0, january(2), january(2)),
            extracted_at: january(2),
            cursor: Cursor::Timestamp(january(2)),
        },
        StagingRecord {
            key: key(2),
            row: event_row(2, 42, 20.0, january(6), january(6)),
            extracted_at: january(6),
            cursor: Cursor::Timestamp(january(6)),
        },
    ];

    let report = FactAppender::new()
        .append(&mut facts, &staging, &dimensions)
        .unwrap();

    assert_eq!(report.appended, 2);
    assert_eq!(facts.rows()[0].dimension_keys, vec![historical_key]);
    assert_eq!(facts.rows()[1].dimension_keys, vec![current_key]);

    // Sanity check the lookup contract both ways.
    assert_eq!(
        dimensions.key_at(&customers(), &key(42), january(3)),
        Some(historical_key)
    );
    assert_eq!(
        dimensions.current_key(&customers(), &key(42)),
        Some(current_key)
    );
}
