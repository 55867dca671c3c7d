//! Orchestration of per-table load cycles.
//!
//! Each source table's extract, land, and watermark-advance steps form one
//! independent unit of work; tables run as concurrent tasks coordinated only
//! through their own watermark entry. Within one table's cycle the steps are
//! strictly sequential, since the watermark may only move after the batch has
//! been durably written.

use std::sync::Arc;
use std::time::Duration;

use config::shared::{PipelineConfig, SourceTableConfig};
use tracing::{error, info, warn};

use crate::alerts::{AlertSink, LoadAlert};
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::dedup::dedupe_batches;
use crate::error::{ErrorKind, FlowError, FlowResult};
use crate::extract::IncrementalExtractor;
use crate::facts::{DimensionLookup, FactAppendReport, FactAppender, FactTable};
use crate::flow_error;
use crate::merge::{DimensionTable, MergeStats, ScdMerger};
use crate::source::base::SourceReader;
use crate::store::batch::base::BatchStore;
use crate::store::watermark::base::WatermarkStore;
use crate::types::{Cursor, TableName};

pub type PipelineId = u64;

/// Outcome of one table's extract, land, and watermark-advance cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A non-empty batch was landed and the watermark advanced.
    Loaded {
        /// Rows in the landed batch.
        rows: usize,
        /// The new watermark value.
        watermark: Cursor,
        /// Artifact name the batch was stored under.
        artifact: String,
    },
    /// The extraction found no new rows; the watermark is unchanged.
    Skipped,
    /// The cycle failed; the watermark is unchanged and the extraction will be
    /// retried from the same cursor.
    Failed { error: FlowError },
}

/// Per-table result of a pipeline cycle.
#[derive(Debug)]
pub struct TableCycleReport {
    /// The table the cycle ran for.
    pub table: TableName,
    /// What the cycle did.
    pub outcome: CycleOutcome,
}

/// Orchestrates incremental loads for a set of configured source tables.
///
/// The pipeline owns the extractor and the shared stores. [`run_cycle`] runs
/// one extraction cycle for every table concurrently; [`run_until_shutdown`]
/// repeats cycles until the shutdown signal fires. Downstream application of
/// landed batches goes through [`apply_dimension`] and [`apply_facts`].
///
/// [`run_cycle`]: Pipeline::run_cycle
/// [`run_until_shutdown`]: Pipeline::run_until_shutdown
/// [`apply_dimension`]: Pipeline::apply_dimension
/// [`apply_facts`]: Pipeline::apply_facts
#[derive(Debug)]
pub struct Pipeline<S, W, B, A> {
    config: Arc<PipelineConfig>,
    extractor: IncrementalExtractor<S>,
    watermarks: W,
    batches: B,
    alerts: A,
    initial_cursor: Cursor,
    shutdown_tx: ShutdownTx,
}

impl<S, W, B, A> Pipeline<S, W, B, A>
where
    S: SourceReader + Clone + Send + Sync + 'static,
    W: WatermarkStore + Clone + Send + Sync + 'static,
    B: BatchStore + Clone + Send + Sync + 'static,
    A: AlertSink + Clone + Send + Sync + 'static,
{
    /// Creates a new pipeline over the given source and stores.
    ///
    /// The configuration is validated up front; an invalid configuration never
    /// produces a partially constructed pipeline.
    pub fn new(
        config: PipelineConfig,
        source: S,
        watermarks: W,
        batches: B,
        alerts: A,
    ) -> FlowResult<Self> {
        config.validate()?;

        // The receiver is recreated on demand via `subscribe`.
        let (shutdown_tx, _) = create_shutdown_channel();

        let initial_cursor = Cursor::from(&config.initial_cursor);

        Ok(Self {
            config: Arc::new(config),
            extractor: IncrementalExtractor::new(source),
            watermarks,
            batches,
            alerts,
            initial_cursor,
            shutdown_tx,
        })
    }

    /// Returns the pipeline identifier.
    pub fn id(&self) -> PipelineId {
        self.config.id
    }

    /// Returns a handle that can request shutdown of [`run_until_shutdown`].
    ///
    /// [`run_until_shutdown`]: Pipeline::run_until_shutdown
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Runs one extraction cycle for every configured table.
    ///
    /// Tables are processed as independent concurrent tasks; one table's
    /// failure never aborts the others. Failures and skips are surfaced as
    /// alerts and returned in the per-table reports.
    pub async fn run_cycle(&self) -> FlowResult<Vec<TableCycleReport>> {
        info!(
            pipeline_id = self.config.id,
            tables = self.config.tables.len(),
            "starting extraction cycle"
        );

        let mut handles = Vec::with_capacity(self.config.tables.len());
        for table_config in &self.config.tables {
            let table_config = table_config.clone();
            let initial_cursor = self.initial_cursor.clone();
            let extractor = self.extractor.clone();
            let watermarks = self.watermarks.clone();
            let batches = self.batches.clone();
            let alerts = self.alerts.clone();

            handles.push(tokio::spawn(run_table_cycle(
                table_config,
                initial_cursor,
                extractor,
                watermarks,
                batches,
                alerts,
            )));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            let report = joined.map_err(|err| {
                flow_error!(
                    ErrorKind::InvalidState,
                    "Table cycle task panicked",
                    detail = err.to_string()
                )
            })?;
            reports.push(report);
        }

        Ok(reports)
    }

    /// Repeats extraction cycles until shutdown is requested.
    ///
    /// The delay between cycles comes from the pipeline configuration.
    pub async fn run_until_shutdown(&self) -> FlowResult<()> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            self.run_cycle().await?;

            tokio::select! {
                _ = shutdown_rx.signaled() => {
                    info!(pipeline_id = self.config.id, "shutdown requested, stopping pipeline");
                    return Ok(());
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// Applies every landed batch of a table to its dimension.
    ///
    /// Batches are deduplicated to one row per business key, then merged with
    /// the table's configured SCD mode. Re-feeding already-applied batches is
    /// a safe no-op. The exclusive borrow of the dimension serializes merges
    /// per target table.
    pub async fn apply_dimension(&self, dimension: &mut DimensionTable) -> FlowResult<MergeStats> {
        let table_config = self.table_config(dimension.name())?;

        let batches = self.batches.load_batches(dimension.name()).await?;
        let staging = dedupe_batches(&batches, table_config)?;

        ScdMerger::new().merge(dimension, &staging, table_config.scd_mode)
    }

    /// Applies every landed batch of a table to a fact table.
    ///
    /// Batches are deduplicated, then appended with dimension references
    /// resolved against `dimensions`. Rows with unresolved references are
    /// excluded and reported, not silently dropped.
    pub async fn apply_facts(
        &self,
        facts: &mut FactTable,
        dimensions: &impl DimensionLookup,
    ) -> FlowResult<FactAppendReport> {
        let table_config = self.table_config(facts.name())?;

        let batches = self.batches.load_batches(facts.name()).await?;
        let staging = dedupe_batches(&batches, table_config)?;

        FactAppender::new().append(facts, &staging, dimensions)
    }

    /// Finds the configuration of a table by name.
    fn table_config(&self, table: &TableName) -> FlowResult<&SourceTableConfig> {
        self.config
            .tables
            .iter()
            .find(|candidate| TableName::from(*candidate) == *table)
            .ok_or_else(|| {
                flow_error!(
                    ErrorKind::ConfigError,
                    "Table is not part of the pipeline configuration",
                    format!("no configuration for table {table}")
                )
            })
    }
}

/// Runs one table's cycle and converts the result into a report plus alerts.
async fn run_table_cycle<S, W, B, A>(
    table_config: SourceTableConfig,
    initial_cursor: Cursor,
    extractor: IncrementalExtractor<S>,
    watermarks: W,
    batches: B,
    alerts: A,
) -> TableCycleReport
where
    S: SourceReader,
    W: WatermarkStore,
    B: BatchStore,
    A: AlertSink,
{
    let table = TableName::from(&table_config);

    match table_cycle(
        &table_config,
        &table,
        &initial_cursor,
        &extractor,
        &watermarks,
        &batches,
    )
    .await
    {
        Ok(CycleOutcome::Skipped) => {
            info!(table = %table, "no rows newer than the stored watermark, skipping");
            send_alert(
                &alerts,
                LoadAlert::skipped(table.clone(), "no rows newer than the stored watermark"),
            )
            .await;

            TableCycleReport {
                table,
                outcome: CycleOutcome::Skipped,
            }
        }
        Ok(outcome) => TableCycleReport { table, outcome },
        Err(cycle_error) => {
            error!(
                table = %table,
                error = %cycle_error,
                "table cycle failed, watermark unchanged"
            );

            let reason = match cycle_error.detail() {
                Some(detail) => format!("{:?}: {detail}", cycle_error.kind()),
                None => format!("{:?}", cycle_error.kind()),
            };
            send_alert(&alerts, LoadAlert::failed(table.clone(), reason)).await;

            TableCycleReport {
                table,
                outcome: CycleOutcome::Failed { error: cycle_error },
            }
        }
    }
}

/// One table's extract, land, and watermark-advance sequence.
///
/// The steps must not be reordered: the watermark only moves after the batch
/// has been durably written, so a failed write leaves the cursor untouched and
/// the retried extraction re-reads the same rows.
async fn table_cycle<S, W, B>(
    table_config: &SourceTableConfig,
    table: &TableName,
    initial_cursor: &Cursor,
    extractor: &IncrementalExtractor<S>,
    watermarks: &W,
    batches: &B,
) -> FlowResult<CycleOutcome>
where
    S: SourceReader,
    W: WatermarkStore,
    B: BatchStore,
{
    let current = watermarks.get(table).await?;

    // An explicit backfill start only applies while the table has never
    // completed a cycle; afterwards the stored watermark wins.
    let backfill_from = if current == *initial_cursor {
        table_config.backfill_from.as_ref().map(Cursor::from)
    } else {
        None
    };

    let batch = extractor
        .extract(table_config, &current, backfill_from.as_ref())
        .await?;

    if batch.is_empty() {
        return Ok(CycleOutcome::Skipped);
    }

    let rows = batch.row_count();
    let proposed = batch.max_cursor.clone().ok_or_else(|| {
        flow_error!(
            ErrorKind::InvalidState,
            "Non-empty batch carries no cursor value"
        )
    })?;

    let artifact = batches.write_batch(batch).await?.ok_or_else(|| {
        flow_error!(
            ErrorKind::InvalidState,
            "Non-empty batch produced no artifact"
        )
    })?;

    let watermark = watermarks.advance(table, proposed).await?;

    info!(
        table = %table,
        rows,
        watermark = %watermark,
        artifact = %artifact,
        "batch landed and watermark advanced"
    );

    Ok(CycleOutcome::Loaded {
        rows,
        watermark,
        artifact,
    })
}

/// Delivers an alert, logging instead of failing when the sink is down.
async fn send_alert<A: AlertSink>(alerts: &A, alert: LoadAlert) {
    if let Err(error) = alerts.send(alert).await {
        warn!(error = %error, "failed to deliver alert event");
    }
}
