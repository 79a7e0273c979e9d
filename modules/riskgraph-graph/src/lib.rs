pub mod client;
pub mod delta;
pub mod loader;
pub mod migrate;
pub mod parser;
pub mod pipeline;
pub mod reader;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use delta::{EdgeIntent, GraphDelta, NodeIntent};
pub use loader::{BatchFailure, BatchedLoader, LoadPhase, LoadReport};
pub use pipeline::{IngestPipeline, IngestStats};
pub use reader::AggregateReader;

pub use neo4rs::query;
