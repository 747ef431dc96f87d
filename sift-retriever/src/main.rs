use anyhow::Context;
use clap::{Parser, Subcommand};
use sift_retriever::{
    config::RetrievalConfig,
    retrieval::engine::{ConsistencyStatus, RetrievalEngine},
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Ingest a directory of text documents and answer questions about it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Embedding model name, or "hashing" for the offline provider
    #[arg(long)]
    model: Option<String>,

    /// Sentences per chunk
    #[arg(long)]
    chunk_size: Option<NonZeroUsize>,

    /// Maximum chunks per embedding batch
    #[arg(long)]
    batch_size: Option<NonZeroUsize>,

    /// Directory for the database, index and processed files record
    #[arg(long)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest new or modified documents
    Ingest {
        /// Directory to ingest (defaults to documents_path from the config)
        directory: Option<PathBuf>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show the chunks most similar to a query
    Search {
        query: String,
        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Answer a query from the best matching chunks
    Ask {
        query: String,
        /// Number of chunks to include in the answer
        #[arg(short = 'k', long, default_value_t = 1)]
        top_k: usize,
    },
    /// Rebuild the vector index from stored embeddings
    Rebuild,
    /// List ingested documents
    Documents {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show store and index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> anyhow::Result<RetrievalConfig> {
    let mut config = match &args.config {
        Some(path) => RetrievalConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RetrievalConfig::default(),
    };

    if let Some(dir) = &args.state_dir {
        config = config.with_state_dir(dir);
    }
    if let Some(model) = &args.model {
        config = config.with_model_name(model.clone());
    }
    if let Some(chunk_size) = args.chunk_size {
        config = config.with_chunk_size(chunk_size);
    }
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    Ok(config)
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let provider = sift_embed::provider_from_config(&config.embed_config())
        .context("creating embedding provider")?;
    let engine = RetrievalEngine::open(config, provider)
        .await
        .context("opening retrieval engine")?;

    let outcome = execute(&engine, args.command).await;
    let closed = engine.close().await.context("closing retrieval engine");
    first_error(outcome, closed)
}

/// The command's own error wins; a close failure after it is only logged.
fn first_error(outcome: anyhow::Result<()>, closed: anyhow::Result<()>) -> anyhow::Result<()> {
    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            tracing::error!("{close_err:#}");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => closed,
    }
}

async fn execute(engine: &RetrievalEngine, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Ingest { directory, format } => {
            let directory = directory.unwrap_or_else(|| engine.config().documents_path.clone());
            let report = engine
                .ingest(&directory)
                .await
                .with_context(|| format!("ingesting {}", directory.display()))?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary => {
                    println!(
                        "Ingested {} of {} files from {}",
                        report.files_ingested,
                        report.files_seen,
                        directory.display()
                    );
                    println!("  Skipped (unchanged): {}", report.files_skipped);
                    println!("  Documents added: {}", report.documents_added);
                    println!("  Chunks added: {}", report.chunks_added);
                    for failure in &report.failures {
                        println!("  Failed: {} ({})", failure.filename, failure.reason);
                    }
                }
            }
        }
        Commands::Search {
            query,
            top_k,
            format,
        } => {
            let results = engine.search(&query, top_k).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Summary => {
                    println!("Found {} matching chunks:", results.len());
                    for (rank, result) in results.iter().enumerate() {
                        println!(
                            "{}. Chunk {} (document {}) score {:.3}",
                            rank + 1,
                            result.chunk_id,
                            result.document_id,
                            result.score
                        );
                        println!("{}", result.content);
                        println!("---");
                    }
                }
            }
        }
        Commands::Ask { query, top_k } => {
            println!("{}", engine.generate_response(&query, top_k).await?);
        }
        Commands::Rebuild => {
            let replayed = engine.rebuild_index().await?;
            println!("Rebuilt vector index with {replayed} embeddings");
        }
        Commands::Documents { format } => {
            let documents = engine.documents().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&documents)?),
                OutputFormat::Summary => {
                    println!("{} documents:", documents.len());
                    for document in documents {
                        println!("{:>6}  {}", document.id, document.filename);
                    }
                }
            }
        }
        Commands::Stats { format } => {
            let stats = engine.stats().await?;
            let consistency = engine.consistency().await?;
            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "stats": stats,
                        "consistency": consistency,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("Documents: {}", stats.store.documents);
                    println!("Chunks: {}", stats.store.chunks);
                    println!(
                        "Estimated chunks (sampled): {:.0}",
                        stats.store.estimated_chunks
                    );
                    println!("Indexed vectors: {}", stats.indexed_vectors);
                    println!("Dimension: {} ({})", stats.dimension, stats.provider);
                    println!("Tracked files: {}", stats.tracked_files);
                    match consistency.status {
                        ConsistencyStatus::Consistent => println!("Index is consistent"),
                        ConsistencyStatus::IndexBehind | ConsistencyStatus::IndexAhead => {
                            println!("Index is out of sync with storage; run `sift rebuild`")
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_command_error_survives_close_failure() {
        let err = first_error(Err(anyhow!("search failed")), Err(anyhow!("close failed")))
            .unwrap_err();
        assert_eq!(err.to_string(), "search failed");

        let err = first_error(Ok(()), Err(anyhow!("close failed"))).unwrap_err();
        assert_eq!(err.to_string(), "close failed");

        assert!(first_error(Ok(()), Ok(())).is_ok());
    }
}
