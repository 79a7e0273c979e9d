use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use riskgraph_common::{Config, Mappings, RecordRow};
use riskgraph_graph::{migrate::migrate, AggregateReader, GraphClient, IngestPipeline};

#[derive(Parser)]
#[command(name = "riskgraph", about = "Controversy graph ingestion and analytics")]
struct Cli {
    /// JSON file mapping raw sector names to display activities.
    #[arg(long, global = true)]
    sector_mapping: Option<PathBuf>,

    /// JSON file mapping raw controversy names to display categories.
    #[arg(long, global = true)]
    controversy_mapping: Option<PathBuf>,

    /// JSON file listing the selectable sectors (informational).
    #[arg(long, global = true)]
    sectors_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create uniqueness constraints and indexes.
    Migrate,
    /// Ingest a JSON array of article rows into the graph.
    Ingest {
        input: PathBuf,
        /// Override BATCH_SIZE for this run.
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Per-activity article counts and worst 2-month performance.
    Overview,
    /// Controversy repartition within one sector.
    Repartition { sector: String },
    /// Worst financial impact per controversy within one sector.
    Impact { sector: String },
    /// Articles of a sector, most market-impactful first.
    Articles { sector: String },
    /// List the selectable sectors from --sectors-file.
    Sectors,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("riskgraph=info".parse()?))
        .init();

    let Cli {
        sector_mapping,
        controversy_mapping,
        sectors_file,
        command,
    } = Cli::parse();

    let mappings = Mappings::load(
        sector_mapping.as_deref(),
        controversy_mapping.as_deref(),
        sectors_file.as_deref(),
    )?;

    // Purely local, no store needed.
    if let Command::Sectors = command {
        for sector in mappings.sectors() {
            println!("{sector}");
        }
        return Ok(());
    }

    let config = Config::from_env();
    let client = GraphClient::from_config(&config).await?;

    match command {
        Command::Migrate => {
            migrate(&client).await?;
        }
        Command::Ingest { input, batch_size } => {
            let raw = fs::read_to_string(&input)
                .with_context(|| format!("cannot read {}", input.display()))?;
            let rows: Vec<RecordRow> =
                serde_json::from_str(&raw).context("input must be a JSON array of rows")?;

            migrate(&client).await?;

            let pipeline = IngestPipeline::new(client.clone())
                .with_batch_size(batch_size.unwrap_or(config.batch_size));
            let stats = pipeline.run(&rows).await;

            info!(
                rows = stats.rows_total,
                skipped = stats.rows_skipped,
                nodes = stats.nodes,
                edges = stats.edges,
                "ingestion finished"
            );
            for failure in &stats.report.failures {
                // Committed batches are untouched; re-running the whole
                // ingest is safe and will fill in the gaps.
                warn!(
                    phase = ?failure.phase,
                    batch = failure.batch,
                    error = failure.error.as_str(),
                    "batch failed, rerun to retry"
                );
            }
        }
        Command::Overview => {
            let reader = AggregateReader::new(client, mappings);
            print_json(&reader.activity_overview().await)?;
        }
        Command::Repartition { sector } => {
            let reader = AggregateReader::new(client, mappings);
            print_json(&reader.controversy_repartition(&sector).await)?;
        }
        Command::Impact { sector } => {
            let reader = AggregateReader::new(client, mappings);
            print_json(&reader.financial_impact(&sector).await)?;
        }
        Command::Articles { sector } => {
            let reader = AggregateReader::new(client, mappings);
            print_json(&reader.sector_articles(&sector).await)?;
        }
        Command::Sectors => unreachable!("handled before connecting"),
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(rows: &[T]) -> Result<()> {
    for row in rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}
