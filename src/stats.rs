//! Index statistics.
//!
//! `mishkat stats` prints the configured index's vector count and dimension,
//! and warns when the dimension does not match the embedding model.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::providers;

pub async fn run_stats(config: &Config) -> Result<()> {
    let index = providers::build_index(config).await?;
    let stats = index
        .stats()
        .await
        .with_context(|| format!("Failed to read stats for index '{}'", index.name()))?;

    println!("Mishkat — Index Stats");
    println!("=====================");
    println!();
    println!("  Provider:    {}", config.index.provider);
    println!("  Index:       {}", index.name());
    println!("  Vectors:     {}", stats.total_vector_count);
    match stats.dimension {
        Some(d) => println!("  Dimension:   {}", d),
        None => println!("  Dimension:   (empty)"),
    }
    println!(
        "  Embedding:   {} ({} dims)",
        config.embedding.model, config.embedding.dims
    );

    if let Some(d) = stats.dimension {
        if d != config.embedding.dims {
            println!();
            println!(
                "  warning: index dimension {} does not match embedding.dims {}",
                d, config.embedding.dims
            );
        }
    }
    Ok(())
}
