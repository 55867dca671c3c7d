use config::load_config;
use config::shared::{LoaderConfig, StorageConfig};
use lakeflow::alerts::{AlertSink, MemoryAlertSink};
use lakeflow::pipeline::Pipeline;
use lakeflow::source::MemorySource;
use lakeflow::source::base::SourceReader;
use lakeflow::store::batch::{BatchStore, MemoryBatchStore};
use lakeflow::store::watermark::{MemoryWatermarkStore, WatermarkStore};
use lakeflow::types::Cursor;
use tracing::{error, info, warn};

pub async fn start_loader() -> anyhow::Result<()> {
    let loader_config: LoaderConfig = load_config()?;
    loader_config.validate()?;

    info!(
        pipeline_id = loader_config.pipeline.id,
        tables = loader_config.pipeline.tables.len(),
        "loader configuration loaded"
    );

    // For each storage backing we start the pipeline with concrete store
    // types. This is more verbose due to static dispatch, but we prefer more
    // performance at the cost of ergonomics.
    match loader_config.storage {
        StorageConfig::Memory => {
            let source = MemorySource::new();
            let watermarks =
                MemoryWatermarkStore::new(Cursor::from(&loader_config.pipeline.initial_cursor));
            let batches = MemoryBatchStore::new();
            let alerts = MemoryAlertSink::new();

            let pipeline =
                Pipeline::new(loader_config.pipeline, source, watermarks, batches, alerts)?;

            start_pipeline(pipeline).await
        }
    }
}

async fn start_pipeline<S, W, B, A>(pipeline: Pipeline<S, W, B, A>) -> anyhow::Result<()>
where
    S: SourceReader + Clone + Send + Sync + 'static,
    W: WatermarkStore + Clone + Send + Sync + 'static,
    B: BatchStore + Clone + Send + Sync + 'static,
    A: AlertSink + Clone + Send + Sync + 'static,
{
    // Spawn a task to listen for Ctrl+C and trigger shutdown.
    let shutdown_tx = pipeline.shutdown_tx();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e:?}");
            return;
        }

        info!("Ctrl+C received, shutting down pipeline...");
        if let Err(e) = shutdown_tx.shutdown() {
            warn!("Failed to send shutdown signal: {e:?}");
        }
    });

    pipeline.run_until_shutdown().await?;

    Ok(())
}
