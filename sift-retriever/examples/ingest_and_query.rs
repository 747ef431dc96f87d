//! Ingest a small corpus with the offline hashing provider and query it.
//!
//! Run with `cargo run -p sift-retriever --example ingest_and_query`.

use anyhow::Result;
use sift_retriever::{config::RetrievalConfig, retrieval::engine::RetrievalEngine};
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let workspace = tempdir()?;
    let docs = workspace.path().join("documents");
    std::fs::create_dir_all(&docs)?;

    std::fs::write(
        docs.join("ai.txt"),
        "Artificial intelligence is the study of intelligent agents. \
         Machine learning is a subfield of artificial intelligence. \
         Deep learning uses layered neural networks.",
    )?;
    std::fs::write(
        docs.join("databases.txt"),
        "SQLite is an embedded relational database. \
         Write-ahead logging lets readers proceed while a writer commits.",
    )?;

    let config = RetrievalConfig::default()
        .with_state_dir(workspace.path().join("state"))
        .with_model_name("hashing");
    let provider = sift_embed::provider_from_config(&config.embed_config())?;
    let engine = RetrievalEngine::open(config, provider).await?;

    let report = engine.ingest(&docs).await?;
    println!(
        "Ingested {} files into {} chunks",
        report.files_ingested, report.chunks_added
    );

    for query in [
        "What is the relationship between AI and Machine Learning?",
        "How do readers and writers interact in SQLite?",
    ] {
        println!("\n{}", engine.generate_response(query, 2).await?);
    }

    let stats = engine.stats().await?;
    println!(
        "\n{} documents, {} chunks, {} indexed vectors",
        stats.store.documents, stats.store.chunks, stats.indexed_vectors
    );

    engine.close().await?;
    Ok(())
}
