use std::path::PathBuf;
#[cfg(feature = "openai")]
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docrag::telemetry::{LogFormat, init_tracing};
use docrag::{HybridEmbedder, IndexBuilder, RagConfig, Retriever, ingest, store};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "docrag",
    version,
    about = "Build and query a retrieval index over scraped documentation"
)]
struct Cli {
    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Read settings from a JSON file instead of the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the OpenAI-compatible embedding endpoint, falling back to hashing
    #[cfg(feature = "openai")]
    #[arg(long, global = true, default_value_t = false)]
    openai: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and index every .txt file under a directory
    Build {
        /// Directory of scraped text files
        #[arg(long, default_value = "data")]
        data: PathBuf,

        /// Directory the index is written to
        #[arg(long, default_value = "vector_db")]
        out: PathBuf,
    },
    /// Search a saved index
    Query {
        /// Directory holding a saved index
        #[arg(long, default_value = "vector_db")]
        index: PathBuf,

        /// Number of passages to return (defaults to TOP_K)
        #[arg(long)]
        top_k: Option<usize>,

        /// Print an answer with context and sources instead of ranked passages
        #[arg(long, default_value_t = false)]
        answer: bool,

        /// Query text
        text: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<RagConfig> {
    match path {
        Some(path) => RagConfig::from_json_file(path)
            .with_context(|| format!("failed to read config from {}", path.display())),
        None => RagConfig::from_env().context("invalid configuration in environment"),
    }
}

#[cfg(feature = "openai")]
fn embedder(cli: &Cli, config: &RagConfig) -> Result<HybridEmbedder> {
    let embedder = HybridEmbedder::new(config.embedding_size);
    if !cli.openai {
        return Ok(embedder);
    }
    let provider = docrag::openai::OpenAIEmbeddingProvider::from_env(config.embedding_size)
        .context("failed to configure OpenAI embeddings")?;
    Ok(embedder.with_pretrained(Arc::new(provider)))
}

#[cfg(not(feature = "openai"))]
fn embedder(_cli: &Cli, config: &RagConfig) -> Result<HybridEmbedder> {
    Ok(HybridEmbedder::new(config.embedding_size))
}

async fn build(
    config: RagConfig,
    embedder: HybridEmbedder,
    data: PathBuf,
    out: PathBuf,
) -> Result<()> {
    let documents = ingest::load_directory(&data)
        .with_context(|| format!("failed to load documents from {}", data.display()))?;
    if documents.is_empty() {
        bail!("no .txt files found under {}", data.display());
    }

    let mut builder = IndexBuilder::new(config).with_embedder(embedder);
    let chunk_count = builder.add_documents(&documents);
    info!(documents = documents.len(), chunk_count, "chunked corpus");

    let snapshot = builder.build().await?;
    store::save(&out, &snapshot)?;
    println!(
        "indexed {} chunks from {} documents into {}",
        snapshot.len(),
        documents.len(),
        out.display()
    );
    Ok(())
}

async fn query(
    config: RagConfig,
    embedder: HybridEmbedder,
    index: PathBuf,
    text: String,
    top_k: Option<usize>,
    answer: bool,
) -> Result<()> {
    let snapshot = store::load(&index)
        .with_context(|| format!("failed to load index from {}", index.display()))?;
    let top_k = top_k.unwrap_or(config.top_k);
    let retriever =
        Retriever::builder().config(config).embedder(embedder).snapshot(snapshot).build()?;

    if answer {
        let answer = retriever.answer_with(&text, top_k).await?;
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    let result = retriever.query(&text, top_k).await?;
    for (rank, hit) in result.results.iter().enumerate() {
        let meta = &hit.chunk.metadata;
        let label =
            meta.title.as_deref().or(meta.source_uri.as_deref()).unwrap_or(&meta.document_id);
        println!("{}. [{:.4}] {} (chunk {})", rank + 1, hit.score, label, meta.chunk_index);
        println!("   {}", hit.chunk.text);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("info", if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty });

    let config = load_config(cli.config.as_ref())?;
    let embedder = embedder(&cli, &config)?;

    match cli.command {
        Command::Build { data, out } => build(config, embedder, data, out).await,
        Command::Query { index, top_k, answer, text } => {
            query(config, embedder, index, text, top_k, answer).await
        }
    }
}
