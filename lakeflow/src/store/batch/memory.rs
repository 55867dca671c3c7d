use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::FlowResult;
use crate::failpoints::{WRITE_BATCH__BEFORE_PERSIST, flow_fail_point};
use crate::store::batch::base::BatchStore;
use crate::types::{LandedBatch, TableName};

/// Inner state of [`MemoryBatchStore`].
#[derive(Debug)]
struct Inner {
    /// Landed batches keyed by artifact name. The key ordering doubles as
    /// extraction-time ordering.
    batches: BTreeMap<String, LandedBatch>,
}

/// In-memory batch store for testing and development purposes.
///
/// [`MemoryBatchStore`] stores landed batches in memory, keyed by artifact
/// name. Re-writing a batch under an existing artifact name replaces it, which
/// keeps retried writes idempotent.
#[derive(Debug, Clone)]
pub struct MemoryBatchStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBatchStore {
    /// Creates a new empty batch store.
    pub fn new() -> Self {
        let inner = Inner {
            batches: BTreeMap::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the artifact names of every stored batch.
    pub async fn artifact_names(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.batches.keys().cloned().collect()
    }

    /// Clears all stored batches.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.batches.clear();
    }
}

impl Default for MemoryBatchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStore for MemoryBatchStore {
    async fn write_batch(&self, batch: LandedBatch) -> FlowResult<Option<String>> {
        if batch.is_empty() {
            debug!(table = %batch.table, "skipping artifact for empty batch");
            return Ok(None);
        }

        flow_fail_point(WRITE_BATCH__BEFORE_PERSIST)?;

        let artifact_name = batch.artifact_name();

        let mut inner = self.inner.lock().await;
        info!(
            table = %batch.table,
            artifact = %artifact_name,
            rows = batch.row_count(),
            "landing batch"
        );
        inner.batches.insert(artifact_name.clone(), batch);

        Ok(Some(artifact_name))
    }

    async fn load_batches(&self, table: &TableName) -> FlowResult<Vec<LandedBatch>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .batches
            .values()
            .filter(|batch| batch.table == *table)
            .cloned()
            .collect())
    }
}
