//! PMAY chat server binary
//!
//! Run with: cargo run -p pmay-rag --bin pmay-rag-server -- --config pmay-rag.toml

use clap::Parser;
use pmay_rag::{
    config::{RagConfig, CONFIG_PATH_ENV},
    server::RagServer,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pmay-rag-server")]
#[command(author, version, about = "PMAY chatbot backend: retrieval, reranking and streamed answers")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmay_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = RagConfig::load(args.config.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!("  - Reranker: {} (top {})", config.reranker.model, config.reranker.top_k);
    tracing::info!("  - Index: {}", config.vector_db.storage_path.display());
    tracing::info!("  - Chunk size: {}", config.chunking.chunk_size);

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /chat   - Ask a question (Server-Sent Events)");
    println!("  POST /upload - Upload a PDF");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
