//! Embeds a few sentences and prints their pairwise similarities.
//!
//! Run with `cargo run -p sift-embed --example simple_embedding -- hashing` to use
//! the offline provider, or pass a fastembed model name.

use sift_embed::{EmbedConfig, provider_from_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let model_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| sift_embed::DEFAULT_MODEL_NAME.to_string());
    let config = EmbedConfig::new(model_name);

    let provider = provider_from_config(&config)?;
    provider.initialize().await?;
    println!(
        "Provider: {} (dimension {})",
        provider.name(),
        provider.dimension()
    );

    let texts = vec![
        "Rust is a systems programming language.".to_string(),
        "Machine learning models process natural language.".to_string(),
        "Deep neural networks enable semantic understanding of text.".to_string(),
    ];
    let vectors = provider.encode(&texts).await?;

    for (i, a) in vectors.iter().enumerate() {
        for (j, b) in vectors.iter().enumerate().skip(i + 1) {
            let similarity: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            println!("{} <-> {}: {similarity:.3}", texts[i], texts[j]);
        }
    }
    Ok(())
}
