//! Pipeline — parse rows, build the deduplicated delta, load it.
//!
//! One pipeline run is one logical unit of work against the store.
//! Parsing never aborts the run; unloadable rows are skipped and
//! counted. The load itself is idempotent, so a run may be repeated
//! wholesale after a partial failure.

use tracing::info;

use riskgraph_common::RecordRow;

use crate::delta::GraphDelta;
use crate::loader::{BatchedLoader, LoadReport};
use crate::parser::parse_row;
use crate::GraphClient;

/// Stats from a full ingestion run.
#[derive(Debug)]
pub struct IngestStats {
    pub rows_total: usize,
    /// Rows dropped for lack of an article URL.
    pub rows_skipped: usize,
    /// Unique node intents after global deduplication.
    pub nodes: usize,
    /// Unique edge intents after global deduplication.
    pub edges: usize,
    pub report: LoadReport,
}

/// Orchestrates parser, delta builder, and batched loader.
pub struct IngestPipeline {
    loader: BatchedLoader,
}

impl IngestPipeline {
    pub fn new(client: GraphClient) -> Self {
        Self {
            loader: BatchedLoader::new(client),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.loader = self.loader.with_batch_size(batch_size);
        self
    }

    /// Ingest a corpus of raw rows end to end.
    pub async fn run(&self, rows: &[RecordRow]) -> IngestStats {
        let parsed: Vec<_> = rows.iter().filter_map(parse_row).collect();
        let rows_skipped = rows.len() - parsed.len();

        let delta = GraphDelta::from_rows(&parsed);
        info!(
            rows = rows.len(),
            skipped = rows_skipped,
            nodes = delta.nodes().len(),
            edges = delta.edges().len(),
            "graph delta built"
        );

        let report = self.loader.load(&delta).await;
        info!(
            nodes_loaded = report.nodes_loaded,
            edges_loaded = report.edges_loaded,
            failed_batches = report.failures.len(),
            "ingestion run complete"
        );

        IngestStats {
            rows_total: rows.len(),
            rows_skipped,
            nodes: delta.nodes().len(),
            edges: delta.edges().len(),
            report,
        }
    }
}
