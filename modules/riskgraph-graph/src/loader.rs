//! Batched, transactional, idempotent application of a graph delta.
//!
//! Nodes load fully before edges so every edge can match its endpoints
//! by natural key. Each batch runs inside its own transaction: commit
//! on success, rollback on the first error, and the run carries on
//! with the next batch. Every statement is an upsert, so retrying a
//! run — or re-applying an already-committed batch — is a no-op.
//!
//! Known limitation: one logical writer per store. MERGE on natural
//! keys is not serializable across concurrent ingestion runs.

use neo4rs::Query;
use tracing::{info, warn};

use riskgraph_common::config::DEFAULT_BATCH_SIZE;

use crate::delta::GraphDelta;
use crate::GraphClient;

/// Which half of the load a batch belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Nodes,
    Edges,
}

impl LoadPhase {
    fn label(self) -> &'static str {
        match self {
            LoadPhase::Nodes => "nodes",
            LoadPhase::Edges => "edges",
        }
    }
}

/// One failed batch: everything in it was rolled back. The operator
/// may retry the whole run; committed batches are unaffected.
#[derive(Debug)]
pub struct BatchFailure {
    pub phase: LoadPhase,
    /// Zero-based batch index within its phase.
    pub batch: usize,
    pub error: String,
}

/// Outcome of one load run. `failures` is empty on a clean run.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub node_batches: usize,
    pub edge_batches: usize,
    pub nodes_loaded: usize,
    pub edges_loaded: usize,
    pub failures: Vec<BatchFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies node intents then edge intents in fixed-size transactional
/// batches.
pub struct BatchedLoader {
    client: GraphClient,
    batch_size: usize,
}

impl BatchedLoader {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Apply the whole delta. Failures are collected per batch, never
    /// propagated — ingestion is best-effort across batches.
    pub async fn load(&self, delta: &GraphDelta) -> LoadReport {
        let mut report = LoadReport {
            node_batches: total_batches(delta.nodes().len(), self.batch_size),
            edge_batches: total_batches(delta.edges().len(), self.batch_size),
            ..LoadReport::default()
        };

        let node_batches = delta
            .nodes()
            .chunks(self.batch_size)
            .map(|batch| batch.iter().map(|intent| intent.to_query()).collect())
            .collect();
        report.nodes_loaded = self
            .run_phase(LoadPhase::Nodes, node_batches, &mut report.failures)
            .await;

        let edge_batches = delta
            .edges()
            .chunks(self.batch_size)
            .map(|batch| batch.iter().map(|intent| intent.to_query()).collect())
            .collect();
        report.edges_loaded = self
            .run_phase(LoadPhase::Edges, edge_batches, &mut report.failures)
            .await;

        report
    }

    /// Run one phase over pre-built statements with the same
    /// batch-per-transaction semantics as [`BatchedLoader::load`].
    #[cfg(feature = "test-utils")]
    pub async fn load_statements(&self, phase: LoadPhase, batches: Vec<Vec<Query>>) -> LoadReport {
        let mut report = LoadReport::default();
        match phase {
            LoadPhase::Nodes => report.node_batches = batches.len(),
            LoadPhase::Edges => report.edge_batches = batches.len(),
        }
        let loaded = self.run_phase(phase, batches, &mut report.failures).await;
        match phase {
            LoadPhase::Nodes => report.nodes_loaded = loaded,
            LoadPhase::Edges => report.edges_loaded = loaded,
        }
        report
    }

    /// Apply one phase's batches sequentially, recording each failed
    /// batch and carrying on. Returns the number of committed
    /// statements.
    async fn run_phase(
        &self,
        phase: LoadPhase,
        batches: Vec<Vec<Query>>,
        failures: &mut Vec<BatchFailure>,
    ) -> usize {
        let total = batches.len();
        let mut loaded = 0;

        for (index, batch) in batches.into_iter().enumerate() {
            let size = batch.len();
            match self.apply_batch(batch.into_iter()).await {
                Ok(()) => {
                    loaded += size;
                    info!(
                        phase = phase.label(),
                        batch = index + 1,
                        total,
                        size,
                        "batch committed"
                    );
                }
                Err(e) => {
                    warn!(phase = phase.label(), batch = index + 1, error = %e, "batch rolled back");
                    failures.push(BatchFailure {
                        phase,
                        batch: index,
                        error: e.to_string(),
                    });
                }
            }
        }

        loaded
    }

    /// Run one batch inside a single transaction. The transaction is
    /// the unit of atomicity: either every statement commits or none do.
    async fn apply_batch(
        &self,
        queries: impl Iterator<Item = Query>,
    ) -> Result<(), neo4rs::Error> {
        let mut txn = self.client.graph.start_txn().await?;
        for q in queries {
            if let Err(run_err) = txn.run(q).await {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed statement also failed");
                }
                return Err(run_err);
            }
        }
        txn.commit().await
    }
}

fn total_batches(items: usize, batch_size: usize) -> usize {
    items.div_ceil(batch_size)
}
